//! Test helper modules for wayfinder-client integration tests
//!
//! Provides deterministic capability doubles:
//! - ScriptedLocation: per-watch scripted fix streams
//! - RecordingSpeech / RecordingMap: record every call
//! - StubBackend: queued guidance responses with optional delay or hold

#![allow(dead_code)]

pub mod backend;
pub mod location;
pub mod outputs;

pub use backend::StubBackend;
pub use location::{fix, fix_at, ScriptedLocation, Step};
pub use outputs::{RecordingMap, RecordingSpeech};

use std::sync::Arc;
use wayfinder_client::capabilities::Capabilities;
use wayfinder_client::{NavigationSession, SessionSettings};
use wayfinder_common::events::EventBus;

/// Session wired to the given doubles
pub struct Harness {
    pub session: NavigationSession,
    pub location: Arc<ScriptedLocation>,
    pub speech: Arc<RecordingSpeech>,
    pub map: Arc<RecordingMap>,
    pub backend: Arc<StubBackend>,
    pub events: EventBus,
}

impl Harness {
    /// Default settings: 20 m threshold, 50 s deadline, 10 s update interval
    pub fn new(location: ScriptedLocation, backend: StubBackend) -> Self {
        Self::with_settings(location, backend, SessionSettings::default())
    }

    pub fn with_settings(
        location: ScriptedLocation,
        backend: StubBackend,
        settings: SessionSettings,
    ) -> Self {
        let location = Arc::new(location);
        let speech = Arc::new(RecordingSpeech::new());
        let map = Arc::new(RecordingMap::default());
        let backend = Arc::new(backend);
        let events = EventBus::new(1024);

        let caps = Capabilities {
            location: location.clone(),
            speech: speech.clone(),
            map: map.clone(),
            backend: backend.clone(),
        };

        Self {
            session: NavigationSession::new(caps, settings, events.clone()),
            location,
            speech,
            map,
            backend,
            events,
        }
    }
}
