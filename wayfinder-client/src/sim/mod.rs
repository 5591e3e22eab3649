//! Desktop stand-ins for device capabilities
//!
//! Used by the `wayfinder` binary to drive a real session from a recorded
//! track: fixes come from a JSON-lines file, speech goes to stdout and map
//! calls go to the log.

mod console;
mod replay;

pub use console::{ConsoleSpeech, LogMap};
pub use replay::{load_track, parse_track, ReplayLocation, TrackPoint};
