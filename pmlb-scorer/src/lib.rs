//! pmlb-scorer library interface
//!
//! Exposes the service internals for integration testing

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::services::{AnnotationError, UpstreamAnnotationClient};

/// Base64 data URLs are roughly 4/3 of the image size
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Vision model client; `None` when no API key is configured
    pub annotator: Option<Arc<UpstreamAnnotationClient>>,
    /// Parent of every per-request cancellation token; cancelled on shutdown
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, annotator: Option<UpstreamAnnotationClient>) -> Self {
        Self {
            db,
            annotator: annotator.map(Arc::new),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Annotation client, or a configuration error before any network activity
    pub fn annotator(&self) -> Result<Arc<UpstreamAnnotationClient>, AnnotationError> {
        self.annotator.clone().ok_or_else(|| {
            AnnotationError::Configuration(format!(
                "Missing {} server environment variable",
                pmlb_common::config::API_KEY_ENV
            ))
        })
    }

    /// Remember a failure for the health endpoint
    pub async fn record_error(&self, error: &ApiError) {
        *self.last_error.write().await = Some(error.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::annotate_routes())
        .merge(api::submit_routes())
        .merge(api::leaderboard_routes())
        .merge(api::image_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
