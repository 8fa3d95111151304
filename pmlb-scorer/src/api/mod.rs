//! HTTP API handlers for pmlb-scorer

pub mod annotate;
pub mod health;
pub mod images;
pub mod leaderboard;
pub mod submit;

pub use annotate::annotate_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use leaderboard::leaderboard_routes;
pub use submit::submit_routes;

use axum::extract::rejection::JsonRejection;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{ApiError, AppState};

/// Map a body extraction failure to a 400
pub(crate) fn json_body<T>(payload: Result<axum::Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|axum::Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Per-request cancellation: cancelled on shutdown, or when the returned guard
/// is dropped because the client went away
pub(crate) fn request_cancellation(state: &AppState) -> (CancellationToken, DropGuard) {
    let token = state.shutdown.child_token();
    let guard = token.clone().drop_guard();
    (token, guard)
}
