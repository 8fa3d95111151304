//! Leaderboard entry models

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use pmlb_common::eligibility::{Ranked, RankingOrder};
use pmlb_common::AnnotationResult;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HANDLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").expect("handle pattern is valid"));

/// Social platforms a submitter may link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Twitter,
    Instagram,
    Tiktok,
}

impl SocialPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::Tiktok => "tiktok",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "twitter" => Some(SocialPlatform::Twitter),
            "instagram" => Some(SocialPlatform::Instagram),
            "tiktok" => Some(SocialPlatform::Tiktok),
            _ => None,
        }
    }

    /// Public profile URL for a normalized handle
    pub fn profile_url(&self, handle: &str) -> String {
        match self {
            SocialPlatform::Twitter => format!("https://x.com/{}", handle),
            SocialPlatform::Instagram => format!("https://instagram.com/{}", handle),
            SocialPlatform::Tiktok => format!("https://tiktok.com/@{}", handle),
        }
    }
}

/// Validated social link attached to a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialLink {
    pub platform: SocialPlatform,
    pub handle: String,
}

impl SocialLink {
    /// Normalize and validate a handle: surrounding whitespace and leading `@` are
    /// stripped, the remainder must be 1-30 of `[A-Za-z0-9._]`
    pub fn new(platform: SocialPlatform, raw_handle: &str) -> Option<Self> {
        let handle = raw_handle.trim().trim_start_matches('@').trim();
        if !HANDLE_PATTERN.is_match(handle) {
            return None;
        }
        Some(Self {
            platform,
            handle: handle.to_string(),
        })
    }

    pub fn url(&self) -> String {
        self.platform.profile_url(&self.handle)
    }
}

/// Entry about to be persisted
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub image_data_url: String,
    pub image_hash: String,
    pub annotation: AnnotationResult,
    pub score: u8,
    pub matched_keywords: Vec<String>,
    pub male_subject: bool,
    pub social: Option<SocialLink>,
    pub podium_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

/// Persisted entry (image bytes excluded)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub id: i64,
    pub image_hash: Option<String>,
    pub score: u8,
    pub matched_keywords: Vec<String>,
    pub male_subject: bool,
    pub social_platform: Option<SocialPlatform>,
    pub social_url: Option<String>,
    pub podium_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredEntry {
    /// Cache-friendly image URL: content-addressed when the hash is known
    pub fn image_url(&self) -> String {
        match &self.image_hash {
            Some(hash) => format!("/img/{}/{}", self.id, hash),
            None => format!("/img/{}", self.id),
        }
    }
}

impl Ranked for StoredEntry {
    fn rank_score(&self) -> u8 {
        self.score
    }

    fn rank_created(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Stored image for the image routes
#[derive(Debug, Clone)]
pub struct EntryImage {
    pub image_data_url: String,
    pub image_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard query parameters, already clamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardFilter {
    pub min_score: u8,
    pub limit: u32,
    pub order: RankingOrder,
    pub male_only: bool,
    pub podium_only: bool,
    /// Case-insensitive substring over matched keywords and annotation text
    pub query: Option<String>,
}

impl Default for LeaderboardFilter {
    fn default() -> Self {
        Self {
            min_score: pmlb_common::eligibility::MIN_ELIGIBLE_SCORE,
            limit: pmlb_common::eligibility::DEFAULT_QUERY_LIMIT,
            order: RankingOrder::default(),
            male_only: true,
            podium_only: false,
            query: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_urls() {
        let x = SocialLink::new(SocialPlatform::Twitter, "@@matcha_guy").unwrap();
        assert_eq!(x.handle, "matcha_guy");
        assert_eq!(x.url(), "https://x.com/matcha_guy");

        let ig = SocialLink::new(SocialPlatform::Instagram, " tote.bag ").unwrap();
        assert_eq!(ig.url(), "https://instagram.com/tote.bag");

        let tt = SocialLink::new(SocialPlatform::Tiktok, "@vinyl").unwrap();
        assert_eq!(tt.url(), "https://tiktok.com/@vinyl");
    }

    #[test]
    fn test_invalid_handles() {
        assert!(SocialLink::new(SocialPlatform::Twitter, "@").is_none());
        assert!(SocialLink::new(SocialPlatform::Twitter, "has space").is_none());
        assert!(SocialLink::new(SocialPlatform::Twitter, &"a".repeat(31)).is_none());
        assert!(SocialPlatform::parse("myspace").is_none());
    }
}
