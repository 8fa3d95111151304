//! Annotation endpoint
//!
//! POST /api/annotate runs the vision model on one image and returns the raw
//! annotation without scoring or storing it.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use pmlb_common::{parse_data_url, AnnotationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::{json_body, request_cancellation};
use crate::services::AnnotationMeta;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateRequest {
    pub image_data_url: String,
}

/// Upstream and end-to-end durations in milliseconds
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub upstream_ms: u64,
    pub total_ms: u64,
}

impl From<&AnnotationMeta> for Timings {
    fn from(meta: &AnnotationMeta) -> Self {
        Self {
            upstream_ms: meta.last_upstream_elapsed_ms,
            total_ms: meta.total_elapsed_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateResponse {
    pub success: bool,
    pub result: AnnotationResult,
    pub usage: Value,
    pub upstream_status: Option<u16>,
    pub attempts: u32,
    pub timings: Timings,
}

/// POST /api/annotate handler
///
/// **Request:** `{"imageDataUrl": "data:image/jpeg;base64,..."}`
///
/// **Errors:**
/// - 400 Bad Request: body is not JSON or the image is not a base64 image data URL
/// - 500 Internal Server Error: no vision model API key configured
/// - 502 Bad Gateway: upstream rejected the request (not retried)
/// - 504 Gateway Timeout: every attempt failed transiently
pub async fn annotate_image(
    State(state): State<AppState>,
    payload: Result<Json<AnnotateRequest>, JsonRejection>,
) -> ApiResult<Json<AnnotateResponse>> {
    let request_id = Uuid::new_v4();
    let result = annotate_inner(&state, payload)
        .instrument(tracing::info_span!("annotate", %request_id))
        .await;

    if let Err(e) = &result {
        tracing::warn!(%request_id, error = %e, "Annotation request failed");
        state.record_error(e).await;
    }
    result
}

async fn annotate_inner(
    state: &AppState,
    payload: Result<Json<AnnotateRequest>, JsonRejection>,
) -> ApiResult<Json<AnnotateResponse>> {
    let annotator = state.annotator()?;
    let request = json_body(payload)?;
    let image = parse_data_url(&request.image_data_url).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (cancel, _guard) = request_cancellation(state);
    let annotated = annotator.annotate(&image, &cancel).await?;

    Ok(Json(AnnotateResponse {
        success: true,
        timings: Timings::from(&annotated.meta),
        upstream_status: annotated.meta.upstream_status,
        attempts: annotated.meta.attempts_used,
        result: annotated.annotation,
        usage: annotated.usage,
    }))
}

/// Build annotation routes
pub fn annotate_routes() -> Router<AppState> {
    Router::new().route("/api/annotate", post(annotate_image))
}
