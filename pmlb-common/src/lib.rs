//! # PMLB Common Library
//!
//! Shared code for the PMLB scoring service and its tooling:
//! - Annotation contract (the structured output of the vision model) and its validation
//! - Keyword lexicon and the deterministic scoring engine
//! - Leaderboard eligibility and ranking policy
//! - Image payload handling (data URLs, content hashing)
//! - Configuration loading
//! - Common error types

pub mod annotation;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod image;
pub mod lexicon;
pub mod scoring;

pub use annotation::{AnnotationResult, ValidationMode};
pub use eligibility::{is_eligible, Eligibility};
pub use error::{Error, Result};
pub use image::{content_hash, parse_data_url, ImagePayload};
pub use scoring::{compute_score, ScoreRecord};
