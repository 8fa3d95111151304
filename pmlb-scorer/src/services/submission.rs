//! Submission pipeline
//!
//! **Algorithm:**
//! 1. Decode the data URL and compute the content hash
//! 2. Reject if an entry with the same hash or data URL already exists
//!    (before any upstream call)
//! 3. Annotate through the retrying client
//! 4. Score, evaluate eligibility, persist
//! 5. A unique-constraint rejection at insert time is also a duplicate
//!
//! Every entry is stored; eligibility only decides leaderboard visibility.

use chrono::Utc;
use pmlb_common::eligibility::has_male_subject;
use pmlb_common::{compute_score, is_eligible, parse_data_url, AnnotationResult, Eligibility};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::db::entries::{self, InsertOutcome};
use crate::models::{NewEntry, SocialLink, StoredEntry};

use super::upstream_client::{AnnotationError, AnnotationMeta, UpstreamAnnotationClient};

/// Validated submission input
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub image_data_url: String,
    pub social: Option<SocialLink>,
    pub podium_opt_in: bool,
}

/// Stored, scored submission
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub entry: StoredEntry,
    pub annotation: AnnotationResult,
    pub eligibility: Eligibility,
    pub meta: AnnotationMeta,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error("Duplicate image (already submitted)")]
    DuplicateSubmission { existing_id: Option<i64> },

    #[error("Failed to save entry: {0}")]
    Storage(#[from] pmlb_common::Error),
}

/// Runs submissions against one database and one annotation client
pub struct SubmissionOrchestrator<'a> {
    db: &'a SqlitePool,
    annotator: &'a UpstreamAnnotationClient,
}

impl<'a> SubmissionOrchestrator<'a> {
    pub fn new(db: &'a SqlitePool, annotator: &'a UpstreamAnnotationClient) -> Self {
        Self { db, annotator }
    }

    pub async fn submit(
        &self,
        request: SubmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let image = parse_data_url(&request.image_data_url).map_err(|e| match e {
            pmlb_common::Error::InvalidInput(msg) => SubmissionError::Validation(msg),
            other => SubmissionError::Storage(other),
        })?;
        let image_hash = image.content_hash();

        if let Some(existing_id) =
            entries::find_duplicate(self.db, &image_hash, &request.image_data_url).await?
        {
            tracing::info!(existing_id, image_hash = %image_hash, "Duplicate submission rejected before annotation");
            return Err(SubmissionError::DuplicateSubmission {
                existing_id: Some(existing_id),
            });
        }

        let annotated = self.annotator.annotate(&image, cancel).await?;
        let annotation = annotated.annotation;

        let record = compute_score(&annotation);
        let eligibility = is_eligible(&annotation, record.score);

        let new_entry = NewEntry {
            image_data_url: request.image_data_url,
            image_hash,
            male_subject: has_male_subject(&annotation),
            annotation: annotation.clone(),
            score: record.score,
            matched_keywords: record.matched,
            social: request.social,
            podium_opt_in: request.podium_opt_in,
            created_at: Utc::now(),
        };

        match entries::insert_entry(self.db, &new_entry).await? {
            InsertOutcome::Inserted(entry) => {
                tracing::info!(
                    id = entry.id,
                    score = entry.score,
                    eligible = eligibility.eligible,
                    "Submission scored"
                );
                Ok(SubmissionOutcome {
                    entry,
                    annotation,
                    eligibility,
                    meta: annotated.meta,
                })
            }
            InsertOutcome::Duplicate => Err(SubmissionError::DuplicateSubmission { existing_id: None }),
        }
    }
}
