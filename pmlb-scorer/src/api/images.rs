//! Image serving
//!
//! `/img/:id` serves the stored image with its content hash as ETag.
//! `/img/:id/:hash` is the canonical, content-addressed URL: because the URL
//! changes whenever the bytes change, responses are cacheable forever. A
//! stale or missing hash redirects to the canonical URL.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use pmlb_common::image::is_content_hash;
use pmlb_common::{content_hash, parse_data_url, ImagePayload};

use crate::db::entries;
use crate::models::EntryImage;
use crate::{ApiError, ApiResult, AppState};

const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";
const CACHE_CANONICAL: &str = "public, max-age=31536000, immutable, \
     stale-while-revalidate=86400, stale-if-error=604800, s-maxage=31536000";

fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("Invalid id".to_string()))
}

async fn load_image(state: &AppState, id: i64) -> ApiResult<(EntryImage, ImagePayload)> {
    let stored = entries::get_entry_image(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("image {}", id)))?;

    let payload = parse_data_url(&stored.image_data_url).map_err(|e| {
        tracing::error!(id, error = %e, "Stored image data is unreadable");
        ApiError::Internal("Invalid image data".to_string())
    })?;

    Ok((stored, payload))
}

/// RFC 7231 IMF-fixdate
fn http_date(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn not_modified(headers: &HeaderMap, etag: &str) -> Option<Response> {
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);

    matches.then(|| (StatusCode::NOT_MODIFIED, [(header::ETAG, etag.to_string())]).into_response())
}

fn image_response(
    payload: ImagePayload,
    etag: String,
    cache_control: &'static str,
    created_at: &DateTime<Utc>,
) -> ApiResult<Response> {
    let content_type = HeaderValue::from_str(&payload.mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let length = payload.bytes.len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::ETAG, etag)
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::LAST_MODIFIED, http_date(created_at))
        .body(Body::from(payload.bytes))
        .map_err(|e| ApiError::Internal(format!("Failed to build image response: {}", e)))
}

/// GET /img/:id
pub async fn serve_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let (stored, payload) = load_image(&state, id).await?;

    let hash = stored
        .image_hash
        .clone()
        .unwrap_or_else(|| content_hash(&payload.bytes));
    let etag = format!("\"{}\"", hash);

    if let Some(response) = not_modified(&headers, &etag) {
        return Ok(response);
    }
    image_response(payload, etag, CACHE_IMMUTABLE, &stored.created_at)
}

/// GET /img/:id/:hash
pub async fn serve_canonical_image(
    State(state): State<AppState>,
    Path((id, hash)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    if !is_content_hash(&hash) {
        return Err(ApiError::BadRequest("Invalid hash".to_string()));
    }
    let (stored, payload) = load_image(&state, id).await?;

    match stored.image_hash.as_deref() {
        Some(stored_hash) if stored_hash == hash => {}
        stored_hash => {
            let canonical = stored_hash
                .map(str::to_string)
                .unwrap_or_else(|| content_hash(&payload.bytes));
            tracing::debug!(id, requested = %hash, "Redirecting to canonical image URL");
            let location = format!("/img/{}/{}", id, canonical);
            return Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response());
        }
    }

    let etag = format!("\"{}\"", hash);
    if let Some(response) = not_modified(&headers, &etag) {
        return Ok(response);
    }
    image_response(payload, etag, CACHE_CANONICAL, &stored.created_at)
}

/// Build image routes
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/img/:id", get(serve_image))
        .route("/img/:id/:hash", get(serve_canonical_image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-1").is_err());
        assert!(parse_id("abc").is_err());
    }

    #[test]
    fn test_http_date() {
        let at = Utc.with_ymd_and_hms(2025, 8, 1, 9, 5, 3).unwrap();
        assert_eq!(http_date(&at), "Fri, 01 Aug 2025 09:05:03 GMT");
    }
}
