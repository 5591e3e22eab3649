//! Navigation core
//!
//! - [`AccuracyAcquirer`]: one fix meeting an accuracy target
//! - [`RateLimitedTracker`]: continuous fixes, forwarded at most once per interval
//! - [`InstructionAnnouncer`]: deduplicated spoken guidance
//! - [`NavigationSession`]: the state machine tying them to the backend

pub mod acquirer;
pub mod announcer;
pub mod session;
pub mod tracker;

pub use acquirer::{AccuracyAcquirer, Acquisition};
pub use announcer::{Announcement, InstructionAnnouncer};
pub use session::{NavigationSession, SessionSettings};
pub use tracker::{RateLimitedTracker, TrackerEvent, TrackingHandle};
