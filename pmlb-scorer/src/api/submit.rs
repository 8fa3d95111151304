//! Submission endpoint
//!
//! POST /api/submit: dedup, annotate, score and store one image.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use pmlb_common::{AnnotationResult, Eligibility};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use super::{json_body, request_cancellation};
use crate::models::{SocialLink, SocialPlatform};
use crate::services::{SubmissionOrchestrator, SubmissionRequest};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub image_data_url: String,
    #[serde(default)]
    pub social_platform: Option<String>,
    #[serde(default)]
    pub social_handle: Option<String>,
    #[serde(default)]
    pub podium_opt_in: Option<bool>,
    /// Newer name for `podium_opt_in`; wins when both are sent
    #[serde(default)]
    pub leaderboard_opt_in: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub id: i64,
    pub score: u8,
    pub matched_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub social_platform: Option<SocialPlatform>,
    pub social_url: Option<String>,
    pub podium_opt_in: bool,
    pub image_url: String,
    pub eligibility: Eligibility,
    pub result: AnnotationResult,
}

impl SubmitRequest {
    /// Validate optional fields into a pipeline request
    ///
    /// A platform and handle must each be valid when present; a link is only
    /// recorded when both are given.
    pub fn into_submission(self) -> Result<SubmissionRequest, ApiError> {
        let platform = self
            .social_platform
            .as_deref()
            .map(|p| {
                SocialPlatform::parse(p).ok_or_else(|| {
                    ApiError::BadRequest(format!(
                        "socialPlatform must be one of twitter, instagram, tiktok (got '{}')",
                        p
                    ))
                })
            })
            .transpose()?;

        let social = match (platform, self.social_handle.as_deref()) {
            (Some(platform), Some(handle)) => Some(SocialLink::new(platform, handle).ok_or_else(|| {
                ApiError::BadRequest(
                    "socialHandle must be 1-30 letters, digits, '.' or '_'".to_string(),
                )
            })?),
            (None, Some(handle)) if SocialLink::new(SocialPlatform::Twitter, handle).is_none() => {
                return Err(ApiError::BadRequest(
                    "socialHandle must be 1-30 letters, digits, '.' or '_'".to_string(),
                ))
            }
            _ => None,
        };

        Ok(SubmissionRequest {
            image_data_url: self.image_data_url,
            social,
            podium_opt_in: self.leaderboard_opt_in.or(self.podium_opt_in).unwrap_or(true),
        })
    }
}

/// POST /api/submit handler
///
/// **Request:** `{"imageDataUrl": "...", "socialPlatform"?, "socialHandle"?, "leaderboardOptIn"?}`
///
/// **Errors:**
/// - 400 Bad Request: malformed body, image or social fields
/// - 409 Conflict: the same image was already submitted
/// - 500 / 502 / 504: as for /api/annotate
pub async fn submit_entry(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let request_id = Uuid::new_v4();
    let result = submit_inner(&state, payload)
        .instrument(tracing::info_span!("submit", %request_id))
        .await;

    if let Err(e) = &result {
        tracing::warn!(%request_id, error = %e, "Submission failed");
        state.record_error(e).await;
    }
    result
}

async fn submit_inner(
    state: &AppState,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let annotator = state.annotator()?;
    let request = json_body(payload)?.into_submission()?;

    let (cancel, _guard) = request_cancellation(state);
    let outcome = SubmissionOrchestrator::new(&state.db, &annotator)
        .submit(request, &cancel)
        .await?;

    let entry = outcome.entry;
    Ok(Json(SubmitResponse {
        success: true,
        id: entry.id,
        score: entry.score,
        image_url: entry.image_url(),
        matched_keywords: entry.matched_keywords,
        created_at: entry.created_at,
        social_platform: entry.social_platform,
        social_url: entry.social_url,
        podium_opt_in: entry.podium_opt_in,
        eligibility: outcome.eligibility,
        result: outcome.annotation,
    }))
}

/// Build submission routes
pub fn submit_routes() -> Router<AppState> {
    Router::new().route("/api/submit", post(submit_entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> SubmitRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_opt_in_precedence() {
        let both = request(serde_json::json!({
            "imageDataUrl": "data:image/png;base64,AAAA",
            "podiumOptIn": true,
            "leaderboardOptIn": false
        }));
        assert!(!both.into_submission().unwrap().podium_opt_in);

        let neither = request(serde_json::json!({"imageDataUrl": "data:image/png;base64,AAAA"}));
        assert!(neither.into_submission().unwrap().podium_opt_in);
    }

    #[test]
    fn test_social_fields() {
        let ok = request(serde_json::json!({
            "imageDataUrl": "x",
            "socialPlatform": "instagram",
            "socialHandle": "@tote.bag"
        }));
        let social = ok.into_submission().unwrap().social.unwrap();
        assert_eq!(social.url(), "https://instagram.com/tote.bag");

        let handle_only = request(serde_json::json!({"imageDataUrl": "x", "socialHandle": "solo"}));
        assert!(handle_only.into_submission().unwrap().social.is_none());

        let bad_platform = request(serde_json::json!({"imageDataUrl": "x", "socialPlatform": "myspace"}));
        assert!(matches!(bad_platform.into_submission(), Err(ApiError::BadRequest(_))));

        let bad_handle = request(serde_json::json!({
            "imageDataUrl": "x",
            "socialPlatform": "twitter",
            "socialHandle": "no spaces allowed"
        }));
        assert!(matches!(bad_handle.into_submission(), Err(ApiError::BadRequest(_))));
    }
}
