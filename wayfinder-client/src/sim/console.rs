//! Console speech and logging map renderer

use crate::capabilities::{MapRenderer, SpeechError, SpeechOutput};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use wayfinder_common::events::{EventBus, NavEvent, SpeechLifecycle};
use wayfinder_common::time::now;
use wayfinder_common::RouteGeometry;

/// Prints utterances to stdout
///
/// Printing completes immediately, so an utterance is never still active
/// when the next one arrives.
pub struct ConsoleSpeech {
    events: EventBus,
    speaking: AtomicBool,
}

impl ConsoleSpeech {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            speaking: AtomicBool::new(false),
        }
    }

    fn emit(&self, stage: SpeechLifecycle, detail: Option<String>) {
        self.events.emit_lossy(NavEvent::Speech {
            stage,
            detail,
            timestamp: now(),
        });
    }
}

impl SpeechOutput for ConsoleSpeech {
    fn is_available(&self) -> bool {
        true
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.speaking.store(true, Ordering::SeqCst);
        self.emit(SpeechLifecycle::Started, None);

        let written = writeln!(std::io::stdout(), "[speech] {}", text);
        self.speaking.store(false, Ordering::SeqCst);

        match written {
            Ok(()) => {
                self.emit(SpeechLifecycle::Ended, None);
                Ok(())
            }
            Err(e) => {
                self.emit(SpeechLifecycle::Failed, Some(e.to_string()));
                Err(SpeechError::Failed(e.to_string()))
            }
        }
    }

    fn cancel(&self) {
        if self.speaking.swap(false, Ordering::SeqCst) {
            self.emit(SpeechLifecycle::Ended, Some("cancelled".to_string()));
        }
    }
}

/// Logs map calls
#[derive(Debug, Default)]
pub struct LogMap;

impl MapRenderer for LogMap {
    fn render_route(&self, geometry: &RouteGeometry) {
        match geometry.decode_path() {
            Ok(path) => match geometry.bounds() {
                Ok(Some(bounds)) => info!(
                    vertices = path.len(),
                    south = bounds.south,
                    west = bounds.west,
                    north = bounds.north,
                    east = bounds.east,
                    "Route rendered"
                ),
                _ => info!(vertices = path.len(), "Route rendered"),
            },
            Err(e) => warn!(error = %e, "Route geometry not drawable"),
        }
    }

    fn clear_route(&self) {
        debug!("Route cleared");
    }

    fn update_user_marker(&self, latitude: f64, longitude: f64) {
        debug!(latitude, longitude, "User marker moved");
    }
}
