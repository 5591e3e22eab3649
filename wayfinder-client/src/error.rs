//! Error types for wayfinder-client
//!
//! Every failure the navigation session handles maps onto one [`NavError`]
//! variant, and every variant has a status line for the user.

use crate::capabilities::LocationError;
use std::time::Duration;
use thiserror::Error;

/// Navigation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// No position source on this platform
    #[error("Location capability unavailable")]
    AcquisitionUnsupported,

    /// Stream closed before any fix arrived
    #[error("No location fix received within {0:?}")]
    AcquisitionTimeout(Duration),

    /// Non-transient error reported by the location stream
    #[error("Location stream error: {0}")]
    LocationStream(#[from] LocationError),

    /// Backend unreachable (transport failure or unreadable body)
    #[error("Guidance backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend answered with a non-success HTTP status
    #[error("Guidance backend returned HTTP {status}: {detail}")]
    BackendHttpError { status: u16, detail: String },

    #[error("Speech output unavailable")]
    SpeechUnsupported,

    /// Session stopped (or restarted) while the operation was in flight
    #[error("Navigation cancelled")]
    Cancelled,

    #[error("No navigation in progress")]
    NotNavigating,

    #[error("Destination must not be empty")]
    InvalidDestination,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NavError {
    /// Status line shown to the user
    pub fn status_text(&self) -> String {
        match self {
            NavError::AcquisitionUnsupported => {
                "Location is not available on this device. Enable location services and try again."
                    .to_string()
            }
            NavError::AcquisitionTimeout(_) => {
                "Could not get your initial location in time. Try again outdoors.".to_string()
            }
            NavError::LocationStream(e) => {
                format!("GPS error: {}. Check that location is enabled and permitted.", e)
            }
            NavError::BackendUnavailable(msg) => {
                format!("Could not reach the navigation service: {}", msg)
            }
            NavError::BackendHttpError { status, detail } => {
                format!("Navigation service error (HTTP {}): {}", status, detail)
            }
            NavError::SpeechUnsupported => {
                "Speech output is not available; guidance is shown as text.".to_string()
            }
            NavError::Cancelled => "Navigation cancelled.".to_string(),
            NavError::NotNavigating => "No navigation in progress.".to_string(),
            NavError::InvalidDestination => "Please enter a destination.".to_string(),
            NavError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }
}

impl From<wayfinder_common::Error> for NavError {
    fn from(e: wayfinder_common::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

/// Convenience Result type using NavError
pub type Result<T> = std::result::Result<T, NavError>;
