//! # Wayfinder Navigation Client (wayfinder-client)
//!
//! Client-side turn-by-turn navigation assistant.
//!
//! **Purpose:** Acquire an accurate starting fix, ask the guidance backend
//! for a route, speak and render the guidance, then keep the backend updated
//! with the user's position at a bounded rate until navigation is stopped.
//!
//! **Architecture:** Device services (location, speech, map) and the
//! guidance backend are injected as capability traits; the
//! [`NavigationSession`] state machine coordinates them on a Tokio runtime
//! and reports progress on the shared [`EventBus`](wayfinder_common::events::EventBus).

pub mod backend;
pub mod capabilities;
pub mod error;
pub mod navigation;
pub mod share;
pub mod sim;
pub mod voice_command;

pub use error::{NavError, Result};
pub use navigation::{NavigationSession, SessionSettings};
pub use share::ShareMessage;
pub use voice_command::VoiceCommand;
