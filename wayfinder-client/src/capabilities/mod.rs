//! Capability interfaces for the navigation core
//!
//! The device services the navigation core depends on (position sensor,
//! speech synthesis, map display) are injected through these traits so the
//! core can run against real platform bindings, the replay simulator, or
//! deterministic test doubles.

pub mod location;
pub mod map;
pub mod speech;

pub use location::{
    FixOptions, FixResult, FixSender, FixSubscription, LocationCapability, LocationError, WatchGuard,
    WatchId,
};
pub use map::{MapRenderer, NullMap};
pub use speech::{SilentSpeech, SpeechError, SpeechOutput};

use crate::backend::GuidanceBackend;
use std::sync::Arc;

/// Every collaborator a navigation session talks to
#[derive(Clone)]
pub struct Capabilities {
    pub location: Arc<dyn LocationCapability>,
    pub speech: Arc<dyn SpeechOutput>,
    pub map: Arc<dyn MapRenderer>,
    pub backend: Arc<dyn GuidanceBackend>,
}

impl Capabilities {
    /// Headless bundle: no speech, no map
    pub fn headless(
        location: Arc<dyn LocationCapability>,
        backend: Arc<dyn GuidanceBackend>,
    ) -> Self {
        Self {
            location,
            speech: Arc::new(SilentSpeech),
            map: Arc::new(NullMap),
            backend,
        }
    }
}
