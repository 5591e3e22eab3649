//! Guidance backend interface
//!
//! The backend receives a destination and the current position and answers
//! with instructions and route geometry.

mod http;

pub use http::{HttpGuidanceClient, NAVIGATE_PATH};

use crate::error::NavError;
use async_trait::async_trait;
use thiserror::Error;
use wayfinder_common::{GuidanceRequest, GuidanceResponse};

/// Guidance backend errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<BackendError> for NavError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Network(msg) => NavError::BackendUnavailable(msg),
            BackendError::Parse(msg) => {
                NavError::BackendUnavailable(format!("unreadable response: {}", msg))
            }
            BackendError::Http { status, detail } => NavError::BackendHttpError { status, detail },
        }
    }
}

/// Source of turn-by-turn guidance
#[async_trait]
pub trait GuidanceBackend: Send + Sync {
    async fn request_guidance(
        &self,
        request: &GuidanceRequest,
    ) -> Result<GuidanceResponse, BackendError>;
}
