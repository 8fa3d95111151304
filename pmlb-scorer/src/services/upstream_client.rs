//! Vision model annotation client
//!
//! Sends one image to the vision model and returns a validated
//! [`AnnotationResult`], retrying transient failures under the shared
//! [`RetryPolicy`].
//!
//! **Attempt classification:**
//! - Transport failure or timeout: retry
//! - Status in the retryable set: retry
//! - Any other non-2xx status: fail immediately (`UpstreamRejected`)
//! - 2xx without string content at `choices[0].message.content`: retry
//! - Content that does not parse as an annotation under the configured
//!   [`ValidationMode`]: retry
//! - Otherwise: success
//!
//! Only the final outcome survives; per-attempt details are logged and dropped.

use pmlb_common::annotation::{parse_annotation, AnnotationResult, ValidationMode};
use pmlb_common::config::{ApiKey, UpstreamSettings, API_KEY_ENV};
use pmlb_common::ImagePayload;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::request_builder::{AnnotationRequestBuilder, ChatCompletionRequest};
use super::retry::{AttemptOutcome, RetryError, RetryPolicy};
use super::transport::{AnnotationTransport, HttpTransport, TransportError, TransportResponse};

/// Characters of unparseable content kept for diagnostics
const CONTENT_SNIPPET_CHARS: usize = 200;

/// Timing and attempt bookkeeping returned with every outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationMeta {
    pub attempts_used: u32,
    pub total_elapsed_ms: u64,
    pub last_upstream_elapsed_ms: u64,
    /// Last HTTP status received from the vision model, if any
    pub upstream_status: Option<u16>,
}

/// Successful annotation
#[derive(Debug, Clone)]
pub struct Annotated {
    pub annotation: AnnotationResult,
    /// Upstream token usage, passed through verbatim (`null` when absent)
    pub usage: Value,
    pub meta: AnnotationMeta,
}

/// Why one attempt was judged transient
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FailureDetail {
    /// Retryable HTTP status with its best-effort decoded body
    Status { status: u16, error: Value },
    /// Content was present but not an acceptable annotation
    InvalidContent {
        message: String,
        #[serde(rename = "contentSnippet")]
        content_snippet: String,
    },
    /// Transport failure, malformed envelope or missing content
    Message { message: String },
}

impl FailureDetail {
    fn message(message: impl Into<String>) -> Self {
        FailureDetail::Message {
            message: message.into(),
        }
    }
}

/// Annotation failures surfaced to callers
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("{0}")]
    Configuration(String),

    #[error("Upstream request failed with status {status}")]
    UpstreamRejected {
        status: u16,
        details: Value,
        meta: AnnotationMeta,
    },

    #[error("Annotation failed after {} attempts", .meta.attempts_used)]
    AnnotationExhausted {
        last_error: Option<FailureDetail>,
        meta: AnnotationMeta,
    },

    #[error("Annotation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Most recent upstream observation, shared across attempts
#[derive(Debug, Default)]
struct AttemptTrace {
    last_status: Option<u16>,
    last_elapsed_ms: u64,
}

struct Rejection {
    status: u16,
    details: Value,
}

struct AttemptSuccess {
    annotation: AnnotationResult,
    usage: Value,
}

/// Retrying client for the vision model
pub struct UpstreamAnnotationClient {
    transport: Arc<dyn AnnotationTransport>,
    builder: AnnotationRequestBuilder,
    policy: RetryPolicy,
    validation_mode: ValidationMode,
    request_timeout: Duration,
}

impl UpstreamAnnotationClient {
    pub fn new(transport: Arc<dyn AnnotationTransport>, settings: &UpstreamSettings) -> Self {
        Self {
            transport,
            builder: AnnotationRequestBuilder::new(settings.model.clone()),
            policy: RetryPolicy::default(),
            validation_mode: settings.validation_mode,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// Build an HTTP-backed client; fails fast when no API key is configured
    pub fn from_settings(
        settings: &UpstreamSettings,
        api_key: Option<ApiKey>,
    ) -> Result<Self, AnnotationError> {
        let api_key = api_key.ok_or_else(|| {
            AnnotationError::Configuration(format!(
                "Missing {} server environment variable",
                API_KEY_ENV
            ))
        })?;

        let transport = HttpTransport::new(
            settings.endpoint.clone(),
            api_key,
            Duration::from_secs(settings.request_timeout_secs),
        )
        .map_err(|e| AnnotationError::Configuration(format!("HTTP client setup failed: {}", e)))?;

        tracing::info!(
            endpoint = %settings.endpoint,
            model = %settings.model,
            validation_mode = ?settings.validation_mode,
            "Vision model client configured"
        );

        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.validation_mode
    }

    /// Annotate one image
    ///
    /// Cancelling `cancel` stops the current attempt or backoff sleep and
    /// returns [`AnnotationError::Cancelled`] without further upstream calls.
    pub async fn annotate(
        &self,
        image: &ImagePayload,
        cancel: &CancellationToken,
    ) -> Result<Annotated, AnnotationError> {
        let started_at = Instant::now();
        let request = self.builder.build(image);
        let trace = Mutex::new(AttemptTrace::default());

        let transport = self.transport.as_ref();
        let request_ref = &request;
        let trace_ref = &trace;
        let policy = &self.policy;
        let mode = self.validation_mode;
        let timeout = self.request_timeout;

        let result = self
            .policy
            .run("annotate", cancel, move |attempt| {
                run_attempt(transport, request_ref, policy, mode, timeout, trace_ref, attempt)
            })
            .await;

        let (upstream_status, last_upstream_elapsed_ms) = trace
            .lock()
            .map(|t| (t.last_status, t.last_elapsed_ms))
            .unwrap_or((None, 0));
        let meta = |attempts_used| AnnotationMeta {
            attempts_used,
            total_elapsed_ms: started_at.elapsed().as_millis() as u64,
            last_upstream_elapsed_ms,
            upstream_status,
        };

        match result {
            Ok(retried) => {
                let meta = meta(retried.attempts);
                tracing::info!(
                    attempts = meta.attempts_used,
                    upstream_ms = meta.last_upstream_elapsed_ms,
                    total_ms = meta.total_elapsed_ms,
                    "Annotation succeeded"
                );
                Ok(Annotated {
                    annotation: retried.value.annotation,
                    usage: retried.value.usage,
                    meta,
                })
            }
            Err(RetryError::Aborted { attempts, error }) => {
                tracing::warn!(status = error.status, attempts, "Upstream rejected annotation request");
                Err(AnnotationError::UpstreamRejected {
                    status: error.status,
                    details: error.details,
                    meta: meta(attempts),
                })
            }
            Err(RetryError::Exhausted {
                attempts,
                last_failure,
            }) => Err(AnnotationError::AnnotationExhausted {
                last_error: last_failure,
                meta: meta(attempts),
            }),
            Err(RetryError::Cancelled { attempts }) => Err(AnnotationError::Cancelled { attempts }),
        }
    }
}

/// One upstream call, classified for the retry loop
async fn run_attempt(
    transport: &dyn AnnotationTransport,
    request: &ChatCompletionRequest,
    policy: &RetryPolicy,
    mode: ValidationMode,
    timeout: Duration,
    trace: &Mutex<AttemptTrace>,
    attempt: u32,
) -> AttemptOutcome<AttemptSuccess, Rejection, FailureDetail> {
    let t0 = Instant::now();
    let sent = match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    };
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    if let Ok(mut t) = trace.lock() {
        t.last_elapsed_ms = elapsed_ms;
        if let Ok(response) = &sent {
            t.last_status = Some(response.status);
        }
    }

    let outcome = classify(sent, policy, mode);
    let result = match &outcome {
        AttemptOutcome::Done(_) => "success",
        AttemptOutcome::Retry(_) => "retry",
        AttemptOutcome::Abort(_) => "rejected",
    };
    tracing::debug!(attempt, elapsed_ms, result, "Upstream attempt finished");
    outcome
}

fn classify(
    sent: Result<TransportResponse, TransportError>,
    policy: &RetryPolicy,
    mode: ValidationMode,
) -> AttemptOutcome<AttemptSuccess, Rejection, FailureDetail> {
    let response = match sent {
        Ok(response) => response,
        Err(e) => return AttemptOutcome::Retry(FailureDetail::message(e.to_string())),
    };

    if !response.is_success() {
        let body = safe_json(&response.body);
        return if policy.is_retryable(response.status) {
            AttemptOutcome::Retry(FailureDetail::Status {
                status: response.status,
                error: body,
            })
        } else {
            AttemptOutcome::Abort(Rejection {
                status: response.status,
                details: body,
            })
        };
    }

    let envelope: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            return AttemptOutcome::Retry(FailureDetail::message(format!(
                "Invalid JSON in upstream response: {}",
                e
            )))
        }
    };
    let usage = envelope.get("usage").cloned().unwrap_or(Value::Null);

    let content = match envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => content,
        _ => {
            return AttemptOutcome::Retry(FailureDetail::message(
                "No content in upstream response",
            ))
        }
    };

    match parse_annotation(content, mode) {
        Ok(annotation) => AttemptOutcome::Done(AttemptSuccess { annotation, usage }),
        Err(e) => {
            let message = if e.is_syntax() {
                "Failed to parse JSON content".to_string()
            } else {
                format!("Annotation content rejected: {}", e)
            };
            AttemptOutcome::Retry(FailureDetail::InvalidContent {
                message,
                content_snippet: content.chars().take(CONTENT_SNIPPET_CHARS).collect(),
            })
        }
    }
}

/// Decode an upstream error body: JSON if possible, raw text otherwise, `null` if empty
pub fn safe_json(body: &str) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: Value) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn completion(content: &str) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })
    }

    #[test]
    fn test_safe_json() {
        assert_eq!(safe_json(r#"{"error":"bad"}"#), json!({"error": "bad"}));
        assert_eq!(safe_json("Bad Gateway"), json!("Bad Gateway"));
        assert_eq!(safe_json(""), Value::Null);
    }

    #[test]
    fn test_classify_statuses() {
        let policy = RetryPolicy::default();
        let retry = classify(
            Ok(TransportResponse {
                status: 429,
                body: "slow down".into(),
            }),
            &policy,
            ValidationMode::Strict,
        );
        assert!(matches!(
            retry,
            AttemptOutcome::Retry(FailureDetail::Status { status: 429, .. })
        ));

        let abort = classify(
            Ok(TransportResponse {
                status: 401,
                body: r#"{"error":"unauthorized"}"#.into(),
            }),
            &policy,
            ValidationMode::Strict,
        );
        match abort {
            AttemptOutcome::Abort(rejection) => {
                assert_eq!(rejection.status, 401);
                assert_eq!(rejection.details, json!({"error": "unauthorized"}));
            }
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_classify_missing_content() {
        let policy = RetryPolicy::default();
        for body in [json!({"choices": []}), json!({"choices": [{"message": {"content": null}}]}), completion("")] {
            let outcome = classify(ok(body), &policy, ValidationMode::Trusting);
            assert!(matches!(
                outcome,
                AttemptOutcome::Retry(FailureDetail::Message { ref message }) if message == "No content in upstream response"
            ));
        }
    }

    #[test]
    fn test_classify_unparseable_content_keeps_snippet() {
        let long = format!("not json {}", "x".repeat(500));
        let outcome = classify(ok(completion(&long)), &RetryPolicy::default(), ValidationMode::Trusting);
        match outcome {
            AttemptOutcome::Retry(FailureDetail::InvalidContent {
                message,
                content_snippet,
            }) => {
                assert_eq!(message, "Failed to parse JSON content");
                assert_eq!(content_snippet.chars().count(), CONTENT_SNIPPET_CHARS);
            }
            _ => panic!("expected invalid content"),
        }
    }

    #[test]
    fn test_classify_validation_mode() {
        let partial = r#"{"description": "A man with a tote bag"}"#;
        let policy = RetryPolicy::default();

        assert!(matches!(
            classify(ok(completion(partial)), &policy, ValidationMode::Strict),
            AttemptOutcome::Retry(FailureDetail::InvalidContent { .. })
        ));
        match classify(ok(completion(partial)), &policy, ValidationMode::Trusting) {
            AttemptOutcome::Done(success) => {
                assert_eq!(success.annotation.description, "A man with a tote bag");
                assert_eq!(success.usage["prompt_tokens"], 10);
            }
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn test_failure_detail_wire_shape() {
        let detail = FailureDetail::InvalidContent {
            message: "Failed to parse JSON content".into(),
            content_snippet: "{oops".into(),
        };
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            json!({"message": "Failed to parse JSON content", "contentSnippet": "{oops"})
        );
        let status = FailureDetail::Status {
            status: 503,
            error: json!("busy"),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"status": 503, "error": "busy"})
        );
    }
}
