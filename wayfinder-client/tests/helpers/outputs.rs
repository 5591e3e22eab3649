//! Recording speech output and map renderer

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use wayfinder_client::capabilities::{MapRenderer, SpeechError, SpeechOutput};
use wayfinder_common::RouteGeometry;

/// Speech output that stays "speaking" until cancelled or finished
pub struct RecordingSpeech {
    available: AtomicBool,
    speaking: AtomicBool,
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            speaking: AtomicBool::new(false),
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Simulate a platform without speech output
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Let the active utterance end naturally
    pub fn finish(&self) {
        self.speaking.store(false, Ordering::SeqCst);
    }
}

impl SpeechOutput for RecordingSpeech {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingMap {
    routes: Mutex<Vec<RouteGeometry>>,
    clears: AtomicUsize,
    markers: Mutex<Vec<(f64, f64)>>,
}

impl RecordingMap {
    pub fn routes(&self) -> Vec<RouteGeometry> {
        self.routes.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn markers(&self) -> Vec<(f64, f64)> {
        self.markers.lock().unwrap().clone()
    }
}

impl MapRenderer for RecordingMap {
    fn render_route(&self, geometry: &RouteGeometry) {
        self.routes.lock().unwrap().push(geometry.clone());
    }

    fn clear_route(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn update_user_marker(&self, latitude: f64, longitude: f64) {
        self.markers.lock().unwrap().push((latitude, longitude));
    }
}
