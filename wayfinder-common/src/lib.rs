//! # Wayfinder Common Library
//!
//! Shared code for the Wayfinder navigation client and its collaborators:
//! - Location and guidance wire types
//! - Encoded route polyline decoding
//! - Event types (NavEvent enum) and EventBus
//! - TOML configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod polyline;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use types::{GuidanceRequest, GuidanceResponse, LocationFix, RouteGeometry};
