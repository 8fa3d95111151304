//! Test Helper Utilities
//!
//! Shared utilities for testing pmlb-scorer: a scripted upstream transport,
//! canned annotations and image payloads, and an app builder over in-memory
//! SQLite.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pmlb_common::config::UpstreamSettings;
use pmlb_common::ValidationMode;
use pmlb_scorer::services::{
    AnnotationTransport, ChatCompletionRequest, RetryPolicy, TransportError, TransportResponse,
    UpstreamAnnotationClient,
};
use pmlb_scorer::AppState;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// 1x1 transparent PNG
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// PNG data URL; different `variant`s give different bytes (and hashes)
pub fn png_data_url(variant: u8) -> String {
    let mut bytes = PNG_1X1.to_vec();
    bytes.push(variant);
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// One scripted upstream reaction
#[derive(Debug, Clone)]
pub enum Step {
    Reply(u16, String),
    Fail(TransportError),
    /// Never answers; only a timeout or cancellation ends the call
    Hang,
}

/// Transport that replays a fixed script and counts calls
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    last_request: Mutex<Option<Value>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnnotationTransport for ScriptedTransport {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = serde_json::to_value(request).ok();

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(status, body)) => Ok(TransportResponse { status, body }),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportError::Network("script exhausted".into())),
        }
    }
}

/// Chat-completion envelope around `content`
pub fn completion(content: &str) -> Step {
    Step::Reply(
        200,
        json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 812, "completion_tokens": 164, "total_tokens": 976}
        })
        .to_string(),
    )
}

/// Complete annotation JSON (all nine keys)
pub fn annotation_json(description: &str, objects: &[&str]) -> String {
    json!({
        "description": description,
        "objects": objects,
        "actions": ["standing"],
        "environment": "",
        "content_type": "real-world footage",
        "specific_style": "",
        "production_quality": "amateur handheld",
        "summary": "",
        "logos": []
    })
    .to_string()
}

/// Scores 5: iced coffee (3) + stanley tumbler (3), male subject
pub fn iced_coffee_annotation() -> String {
    annotation_json(
        "A man drinks iced coffee from a Stanley tumbler.",
        &["iced coffee cup", "stanley tumbler"],
    )
}

/// Scores 10: teacup pig (7) + labubu (5), male subject
pub fn saturated_annotation() -> String {
    annotation_json("A guy holding a teacup pig.", &["teacup pig", "labubu plushie"])
}

/// Scores 2: beanie only, below the leaderboard minimum
pub fn low_score_annotation() -> String {
    annotation_json("A man in a beanie.", &["beanie"])
}

pub fn settings(mode: ValidationMode) -> UpstreamSettings {
    UpstreamSettings {
        validation_mode: mode,
        ..Default::default()
    }
}

/// Retry policy with the default attempt cap and no waiting
pub fn instant_policy() -> RetryPolicy {
    RetryPolicy {
        delays_ms: vec![0, 0, 0],
        jitter_ms: 0,
        ..Default::default()
    }
}

pub fn scripted_client(
    steps: Vec<Step>,
    mode: ValidationMode,
) -> (UpstreamAnnotationClient, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new(steps);
    let client = UpstreamAnnotationClient::new(transport.clone(), &settings(mode));
    (client, transport)
}

/// Router over in-memory SQLite with a scripted vision model
pub async fn create_test_app(steps: Vec<Step>) -> (axum::Router, AppState, Arc<ScriptedTransport>) {
    let pool = pmlb_scorer::db::init_memory_pool()
        .await
        .expect("Failed to create in-memory database");

    let (client, transport) = scripted_client(steps, ValidationMode::Strict);
    let state = AppState::new(pool, Some(client.with_policy(instant_policy())));
    let app = pmlb_scorer::build_router(state.clone());

    (app, state, transport)
}

/// Router without an API key configured
pub async fn create_unconfigured_app() -> axum::Router {
    let pool = pmlb_scorer::db::init_memory_pool()
        .await
        .expect("Failed to create in-memory database");
    pmlb_scorer::build_router(AppState::new(pool, None))
}
