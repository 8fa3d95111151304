//! Leaderboard query endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use pmlb_common::eligibility::{
    clamp_min_score, clamp_query_limit, RankingOrder, DISPLAY_LIMIT,
};
use serde::{Deserialize, Serialize};

use crate::db::entries;
use crate::models::{LeaderboardFilter, StoredEntry};
use crate::{ApiResult, AppState};

/// Raw query string; every value is parsed leniently
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardParams {
    pub min_score: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub q: Option<String>,
    pub male_only: Option<String>,
}

/// Number parsing that never fails: junk and zero mean "use the default"
fn lenient_number(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .map(|n| n.trunc() as i64)
        .filter(|n| *n != 0)
}

impl LeaderboardParams {
    pub fn to_filter(&self) -> LeaderboardFilter {
        let min_score = match lenient_number(self.min_score.as_deref()) {
            Some(n) if n < 0 => 0,
            Some(n) => clamp_min_score(Some(n.min(u8::MAX as i64) as u8)),
            None => clamp_min_score(None),
        };
        let limit = match lenient_number(self.limit.as_deref()) {
            Some(n) if n < 0 => 1,
            Some(n) => clamp_query_limit(Some(n.min(u32::MAX as i64) as u32)),
            None => clamp_query_limit(None),
        };

        LeaderboardFilter {
            min_score,
            limit,
            order: RankingOrder::parse_lenient(self.sort.as_deref()),
            male_only: self.male_only.as_deref() != Some("false"),
            podium_only: false,
            query: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
        }
    }
}

/// Leaderboard row as served to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: StoredEntry,
    pub image_url: String,
}

impl From<StoredEntry> for EntryView {
    fn from(entry: StoredEntry) -> Self {
        Self {
            image_url: entry.image_url(),
            entry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub entries: Vec<EntryView>,
}

/// GET /api/leaderboard?minScore&limit&sort&q&maleOnly
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let filter = params.to_filter();
    tracing::debug!(?filter, "Leaderboard query");

    let rows = entries::query_leaderboard(&state.db, &filter).await?;
    Ok(Json(LeaderboardResponse {
        success: true,
        entries: rows.into_iter().map(EntryView::from).collect(),
    }))
}

/// GET /api/leaderboard/top: the public display list
pub async fn get_top_entries(State(state): State<AppState>) -> ApiResult<Json<LeaderboardResponse>> {
    let rows = entries::top_entries(&state.db, DISPLAY_LIMIT).await?;
    Ok(Json(LeaderboardResponse {
        success: true,
        entries: rows.into_iter().map(EntryView::from).collect(),
    }))
}

/// Build leaderboard routes
pub fn leaderboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/leaderboard/top", get(get_top_entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_score: Option<&str>, limit: Option<&str>) -> LeaderboardParams {
        LeaderboardParams {
            min_score: min_score.map(str::to_string),
            limit: limit.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let filter = LeaderboardParams::default().to_filter();
        assert_eq!(filter, LeaderboardFilter::default());
    }

    #[test]
    fn test_lenient_clamping() {
        assert_eq!(params(Some("0"), None).to_filter().min_score, 3);
        assert_eq!(params(Some("abc"), None).to_filter().min_score, 3);
        assert_eq!(params(Some("-4"), None).to_filter().min_score, 0);
        assert_eq!(params(Some("99"), None).to_filter().min_score, 10);
        assert_eq!(params(Some("6.7"), None).to_filter().min_score, 6);

        assert_eq!(params(None, Some("0")).to_filter().limit, 50);
        assert_eq!(params(None, Some("-3")).to_filter().limit, 1);
        assert_eq!(params(None, Some("1000")).to_filter().limit, 100);
    }

    #[test]
    fn test_male_only_and_query() {
        let filter = LeaderboardParams {
            male_only: Some("false".into()),
            q: Some("  matcha ".into()),
            sort: Some("time_asc".into()),
            ..Default::default()
        }
        .to_filter();
        assert!(!filter.male_only);
        assert_eq!(filter.query.as_deref(), Some("matcha"));
        assert_eq!(filter.order, RankingOrder::TimeAsc);

        let anything_else = LeaderboardParams {
            male_only: Some("no".into()),
            q: Some("   ".into()),
            ..Default::default()
        }
        .to_filter();
        assert!(anything_else.male_only);
        assert!(anything_else.query.is_none());
    }
}
