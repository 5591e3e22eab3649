//! Event types for the Wayfinder event system
//!
//! Provides the shared event definitions and EventBus used by the navigation
//! session to reach presentation collaborators (status line, instruction
//! list, map, speech indicator).

mod session_types;

pub use session_types::{SessionState, SpeechLifecycle};

use crate::types::LocationFix;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Wayfinder event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NavEvent {
    /// Session state machine transition
    StateChanged {
        session_id: Uuid,
        old_state: SessionState,
        new_state: SessionState,
        timestamp: DateTime<Utc>,
    },

    /// Human-readable status line changed
    ///
    /// Every error the session handles ends up here as well, with
    /// `is_error` set.
    StatusChanged {
        session_id: Uuid,
        text: String,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },

    /// Fresh guidance received from the backend
    ///
    /// `instructions` is None when the backend had nothing to say; the
    /// presentation layer shows "guidance unavailable" in that case.
    GuidanceUpdated {
        session_id: Uuid,
        instructions: Option<String>,
        steps: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Tracked position changed
    ///
    /// Emitted for every fix while tracking, whether or not it was
    /// forwarded to the backend.
    PositionUpdated { session_id: Uuid, fix: LocationFix },

    /// A tracking-cycle backend dispatch failed (session stays active)
    BackendSyncFailed {
        session_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Speech output lifecycle
    Speech {
        stage: SpeechLifecycle,
        detail: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl NavEvent {
    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            NavEvent::StateChanged { .. } => "StateChanged",
            NavEvent::StatusChanged { .. } => "StatusChanged",
            NavEvent::GuidanceUpdated { .. } => "GuidanceUpdated",
            NavEvent::PositionUpdated { .. } => "PositionUpdated",
            NavEvent::BackendSyncFailed { .. } => "BackendSyncFailed",
            NavEvent::Speech { .. } => "Speech",
        }
    }
}

/// Broadcast bus for NavEvent
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NavEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers
    ///   start missing the oldest ones
    ///
    /// # Examples
    ///
    /// ```
    /// use wayfinder_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<NavEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: NavEvent) -> Result<usize, broadcast::error::SendError<NavEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: NavEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
