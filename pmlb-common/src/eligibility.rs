//! Leaderboard eligibility and ranking policy
//!
//! Eligibility uses whole-word matching for subject terms, unlike keyword scoring
//! which matches raw substrings. "mannequin" does not count as "man" here even
//! though "earring" counts as "ring" for scoring. The two matchers are kept apart.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::annotation::AnnotationResult;

/// Lowest score that may appear on the leaderboard
pub const MIN_ELIGIBLE_SCORE: u8 = 3;

/// Entries shown on the public leaderboard page
pub const DISPLAY_LIMIT: u32 = 25;

/// Default and maximum row counts for the query API
pub const DEFAULT_QUERY_LIMIT: u32 = 50;
pub const MAX_QUERY_LIMIT: u32 = 100;

/// Subject terms, matched as whole words, case-insensitively
pub const SUBJECT_TERMS: [&str; 10] = [
    "man", "male", "guy", "boy", "gentleman", "dude", "men", "boys", "guys", "person",
];

static SUBJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", SUBJECT_TERMS.join("|")))
        .expect("subject term pattern is a valid regex")
});

/// Outcome of an eligibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Eligibility {
    fn eligible() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    fn ineligible(reason: String) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }
}

/// True when the annotation text names a male subject as a whole word
pub fn has_male_subject(annotation: &AnnotationResult) -> bool {
    SUBJECT_PATTERN.is_match(&annotation.combined_text())
}

/// Decide leaderboard membership for a scored annotation
pub fn is_eligible(annotation: &AnnotationResult, score: u8) -> Eligibility {
    if score < MIN_ELIGIBLE_SCORE {
        return Eligibility::ineligible(format!(
            "Minimum score for the leaderboard is {}. You scored {}.",
            MIN_ELIGIBLE_SCORE, score
        ));
    }
    if !has_male_subject(annotation) {
        return Eligibility::ineligible(
            "Leaderboard is limited to entries tagged as a male subject. \
             Your submission didn't include a male keyword."
                .to_string(),
        );
    }
    Eligibility::eligible()
}

/// Leaderboard sort orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingOrder {
    /// Highest score first, newer first among equal scores
    #[default]
    ScoreDesc,
    /// Lowest score first, newer first among equal scores
    ScoreAsc,
    TimeDesc,
    TimeAsc,
}

impl RankingOrder {
    /// Parse a query-string value; unknown values fall back to the default order
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("score_asc") => RankingOrder::ScoreAsc,
            Some("time_desc") => RankingOrder::TimeDesc,
            Some("time_asc") => RankingOrder::TimeAsc,
            _ => RankingOrder::ScoreDesc,
        }
    }

    /// Compare two ranked items under this order
    pub fn compare<R: Ranked>(&self, a: &R, b: &R) -> Ordering {
        match self {
            RankingOrder::ScoreDesc => b
                .rank_score()
                .cmp(&a.rank_score())
                .then_with(|| b.rank_created().cmp(&a.rank_created())),
            RankingOrder::ScoreAsc => a
                .rank_score()
                .cmp(&b.rank_score())
                .then_with(|| b.rank_created().cmp(&a.rank_created())),
            RankingOrder::TimeDesc => b.rank_created().cmp(&a.rank_created()),
            RankingOrder::TimeAsc => a.rank_created().cmp(&b.rank_created()),
        }
    }
}

/// Anything that can be placed on the leaderboard
pub trait Ranked {
    fn rank_score(&self) -> u8;
    fn rank_created(&self) -> chrono::DateTime<chrono::Utc>;
}

/// Sort in place and cap to `limit`
pub fn rank<R: Ranked>(items: &mut Vec<R>, order: RankingOrder, limit: usize) {
    items.sort_by(|a, b| order.compare(a, b));
    items.truncate(limit);
}

/// Clamp a requested query limit into 1..=MAX_QUERY_LIMIT
pub fn clamp_query_limit(requested: Option<u32>) -> u32 {
    match requested {
        Some(0) | None => DEFAULT_QUERY_LIMIT,
        Some(n) => n.clamp(1, MAX_QUERY_LIMIT),
    }
}

/// Clamp a requested minimum score into 0..=10
pub fn clamp_min_score(requested: Option<u8>) -> u8 {
    match requested {
        Some(0) | None => MIN_ELIGIBLE_SCORE,
        Some(n) => n.min(crate::scoring::MAX_SCORE),
    }
}
