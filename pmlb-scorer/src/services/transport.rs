//! Upstream transport seam
//!
//! [`AnnotationTransport`] performs exactly one POST of a chat-completion
//! request and reports the raw status and body. Retrying, timing and content
//! validation live above it in the annotation client, so tests can script
//! responses without a network.

use async_trait::async_trait;
use pmlb_common::config::ApiKey;
use std::time::Duration;
use thiserror::Error;

use super::request_builder::ChatCompletionRequest;

const USER_AGENT: &str = concat!("pmlb-scorer/", env!("CARGO_PKG_VERSION"));

/// Transport failures (no HTTP status was received)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),
}

/// Raw upstream reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One request/response exchange with the vision model
#[async_trait]
pub trait AnnotationTransport: Send + Sync {
    async fn send(&self, request: &ChatCompletionRequest)
        -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with bearer authentication
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl AnnotationTransport for HttpTransport {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<TransportResponse, TransportError> {
        tracing::debug!(endpoint = %self.endpoint, model = %request.model, "Posting annotation request");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        // An unreadable error body is reported as empty; an unreadable success body is a failure
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if !status.is_success() => {
                tracing::warn!(status = status.as_u16(), error = %e, "Could not read upstream error body");
                String::new()
            }
            Err(e) if e.is_timeout() => return Err(TransportError::Timeout),
            Err(e) => return Err(TransportError::Network(e.to_string())),
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}
