//! Session-related type definitions
//!
//! Supporting types for navigation session state and speech lifecycle.

use serde::{Deserialize, Serialize};

/// Navigation session state
///
/// `Idle → AcquiringLocation → AwaitingGuidance → Tracking → Stopped → Idle`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No navigation in progress
    #[default]
    Idle,
    /// Waiting for an initial fix that meets the accuracy target
    AcquiringLocation,
    /// Initial fix sent to the backend, waiting for guidance
    AwaitingGuidance,
    /// Following the user's position and refreshing guidance
    Tracking,
    /// Torn down; transitions straight back to Idle
    Stopped,
}

impl SessionState {
    /// True while a navigation attempt owns resources (acquisition, dispatch or tracking)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::AcquiringLocation | SessionState::AwaitingGuidance | SessionState::Tracking
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AcquiringLocation => write!(f, "acquiring_location"),
            SessionState::AwaitingGuidance => write!(f, "awaiting_guidance"),
            SessionState::Tracking => write!(f, "tracking"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Speech output lifecycle notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SpeechLifecycle {
    Started,
    Ended,
    Failed,
}

impl std::fmt::Display for SpeechLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechLifecycle::Started => write!(f, "Started"),
            SpeechLifecycle::Ended => write!(f, "Ended"),
            SpeechLifecycle::Failed => write!(f, "Failed"),
        }
    }
}
