//! Spoken guidance with deduplication
//!
//! The backend repeats the full instruction text on every tracking cycle;
//! only a change is spoken.

use crate::capabilities::{SpeechError, SpeechOutput};
use std::sync::Arc;
use tracing::{debug, warn};

/// What `announce` did with the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// Handed to the speech output
    Spoken,
    /// Same as the last announcement; nothing happened
    Unchanged,
    /// Recorded but not spoken (speech missing or failed)
    TextOnly(SpeechError),
}

pub struct InstructionAnnouncer {
    speech: Arc<dyn SpeechOutput>,
    last_announced: String,
    unavailable_logged: bool,
}

impl InstructionAnnouncer {
    pub fn new(speech: Arc<dyn SpeechOutput>) -> Self {
        Self {
            speech,
            last_announced: String::new(),
            unavailable_logged: false,
        }
    }

    /// Speak `text` unless it equals the last announcement
    ///
    /// Any utterance still in progress is cancelled first so stale guidance
    /// never talks over new guidance.
    pub fn announce(&mut self, text: &str) -> Announcement {
        if text == self.last_announced {
            debug!("Instruction unchanged, not repeating");
            return Announcement::Unchanged;
        }

        let outcome = if !self.speech.is_available() {
            if !self.unavailable_logged {
                warn!("Speech output unavailable, guidance will be text only");
                self.unavailable_logged = true;
            }
            Announcement::TextOnly(SpeechError::Unsupported)
        } else {
            if self.speech.is_speaking() {
                debug!("Cancelling in-progress utterance");
                self.speech.cancel();
            }
            match self.speech.speak(text) {
                Ok(()) => Announcement::Spoken,
                Err(e) => {
                    warn!(error = %e, "Speech output failed");
                    Announcement::TextOnly(e)
                }
            }
        };

        self.last_announced = text.to_string();
        outcome
    }

    /// Silence speech and forget the last announcement
    pub fn reset(&mut self) {
        if self.speech.is_available() {
            self.speech.cancel();
        }
        self.last_announced.clear();
    }

    /// Most recent announcement (empty when none)
    pub fn last_announced(&self) -> &str {
        &self.last_announced
    }
}
