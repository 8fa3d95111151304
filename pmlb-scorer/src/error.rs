//! Error types for pmlb-scorer
//!
//! Every failure leaves the service as
//! `{"error": {"code": ..., "message": ..., "details": ...}}` with `details`
//! present only where there is something beyond the message (upstream status,
//! attempts, timings, last failure).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::services::{AnnotationError, SubmissionError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Image already submitted (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server misconfiguration, e.g. missing API key (500)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream refused the request with a non-retryable status (502)
    #[error("Upstream request failed")]
    UpstreamRejected(Value),

    /// Every upstream attempt failed transiently (504)
    #[error("Annotation failed after retries")]
    AnnotationExhausted(Value),

    /// Request abandoned before completion (503)
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// pmlb-common error
    #[error("Common error: {0}")]
    Common(#[from] pmlb_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code, details) = match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "DUPLICATE_SUBMISSION", None),
            ApiError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                None,
            ),
            ApiError::UpstreamRejected(details) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_REJECTED", Some(details))
            }
            ApiError::AnnotationExhausted(details) => (
                StatusCode::GATEWAY_TIMEOUT,
                "ANNOTATION_EXHAUSTED",
                Some(details),
            ),
            ApiError::Cancelled(_) => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", None),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
            ApiError::Common(ref err) => match err {
                pmlb_common::Error::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", None)
                }
                pmlb_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", None),
            },
            ApiError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<AnnotationError> for ApiError {
    fn from(err: AnnotationError) -> Self {
        match err {
            AnnotationError::Configuration(msg) => ApiError::Configuration(msg),
            AnnotationError::UpstreamRejected {
                status,
                details,
                meta,
            } => ApiError::UpstreamRejected(json!({
                "upstreamStatus": status,
                "upstream": details,
                "attempts": meta.attempts_used,
                "timings": {
                    "upstreamMs": meta.last_upstream_elapsed_ms,
                    "totalMs": meta.total_elapsed_ms,
                },
            })),
            AnnotationError::AnnotationExhausted { last_error, meta } => {
                ApiError::AnnotationExhausted(json!({
                    "lastError": last_error,
                    "upstreamStatus": meta.upstream_status,
                    "attempts": meta.attempts_used,
                    "timings": {
                        "upstreamMs": meta.last_upstream_elapsed_ms,
                        "totalMs": meta.total_elapsed_ms,
                    },
                }))
            }
            AnnotationError::Cancelled { attempts } => {
                ApiError::Cancelled(format!("annotation stopped after {} attempts", attempts))
            }
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(msg) => ApiError::BadRequest(msg),
            SubmissionError::Annotation(inner) => inner.into(),
            dup @ SubmissionError::DuplicateSubmission { .. } => ApiError::Conflict(dup.to_string()),
            SubmissionError::Storage(inner) => ApiError::Common(inner),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AnnotationMeta;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rejected_maps_to_bad_gateway_with_details() {
        let err: ApiError = AnnotationError::UpstreamRejected {
            status: 400,
            details: json!({"error": "bad image"}),
            meta: AnnotationMeta {
                attempts_used: 1,
                total_elapsed_ms: 12,
                last_upstream_elapsed_ms: 10,
                upstream_status: Some(400),
            },
        }
        .into();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UPSTREAM_REJECTED");
        assert_eq!(body["error"]["details"]["upstreamStatus"], 400);
        assert_eq!(body["error"]["details"]["upstream"]["error"], "bad image");
        assert_eq!(body["error"]["details"]["attempts"], 1);
    }

    #[tokio::test]
    async fn test_duplicate_and_validation_statuses() {
        let dup: ApiError = SubmissionError::DuplicateSubmission { existing_id: Some(3) }.into();
        let response = dup.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Conflict: Duplicate image (already submitted)");
        assert!(body["error"].get("details").is_none());

        let invalid: ApiError = SubmissionError::Validation("not an image".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let config: ApiError = AnnotationError::Configuration("no key".into()).into();
        assert_eq!(config.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
