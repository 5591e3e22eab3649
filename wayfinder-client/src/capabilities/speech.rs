//! Speech output capability interface

use thiserror::Error;

/// Speech output errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech synthesis not supported")]
    Unsupported,

    #[error("speech synthesis failed: {0}")]
    Failed(String),
}

/// Text-to-speech output
///
/// At most one utterance is active at a time. Implementations report
/// started/ended/failed lifecycle through `NavEvent::Speech` when they have
/// access to the event bus.
pub trait SpeechOutput: Send + Sync {
    /// False when the platform has no speech synthesis
    fn is_available(&self) -> bool;

    /// True while an utterance is being spoken
    fn is_speaking(&self) -> bool;

    /// Start speaking `text`
    fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Stop the active utterance, if any
    fn cancel(&self);
}

/// Speech output for platforms without synthesis
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeech;

impl SpeechOutput for SilentSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn is_speaking(&self) -> bool {
        false
    }

    fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        Err(SpeechError::Unsupported)
    }

    fn cancel(&self) {}
}
