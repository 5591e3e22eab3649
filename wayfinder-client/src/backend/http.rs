//! HTTP guidance client
//!
//! POSTs `{destination, latitude, longitude}` as JSON to
//! `{base_url}/navigate/` and parses `{instructions, routeData}`.

use super::{BackendError, GuidanceBackend};
use async_trait::async_trait;
use std::time::Duration;
use wayfinder_common::config::BackendConfig;
use wayfinder_common::{GuidanceRequest, GuidanceResponse};

pub const NAVIGATE_PATH: &str = "/navigate/";
const USER_AGENT: &str = concat!("wayfinder/", env!("CARGO_PKG_VERSION"));

/// Error bodies longer than this are cut before reaching the status line
const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Guidance backend over HTTP
pub struct HttpGuidanceClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpGuidanceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), NAVIGATE_PATH),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GuidanceBackend for HttpGuidanceClient {
    async fn request_guidance(
        &self,
        request: &GuidanceRequest,
    ) -> Result<GuidanceResponse, BackendError> {
        tracing::debug!(
            url = %self.endpoint,
            destination = %request.destination,
            latitude = request.latitude,
            longitude = request.longitude,
            "Requesting guidance"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                detail: truncate_detail(&error_text),
            });
        }

        let guidance: GuidanceResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        tracing::debug!(
            has_instructions = guidance.instruction_text().is_some(),
            has_route = guidance.route_geometry.is_some(),
            "Received guidance"
        );

        Ok(guidance)
    }
}

fn truncate_detail(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_DETAIL_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
