//! Leaderboard entry persistence
//!
//! `image_hash` carries a UNIQUE constraint, so two racing submissions of the
//! same image cannot both be stored even if both pass the pre-annotation
//! duplicate check.

use chrono::{DateTime, SecondsFormat, Utc};
use pmlb_common::eligibility::RankingOrder;
use pmlb_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::{EntryImage, LeaderboardFilter, NewEntry, SocialPlatform, StoredEntry};

const ENTRY_COLUMNS: &str = "id, image_hash, score, matched_keywords, male_subject, \
     social_platform, social_url, podium_opt_in, created_at";

/// Result of an insert attempt
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(StoredEntry),
    /// Unique constraint on `image_hash` rejected the row
    Duplicate,
}

/// Fixed-width UTC timestamp; lexicographic order equals chronological order
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse created_at '{}': {}", value, e)))
}

fn split_keywords(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn row_to_entry(row: &SqliteRow) -> Result<StoredEntry> {
    let created_at: String = row.get("created_at");
    let matched: String = row.get("matched_keywords");
    let platform: Option<String> = row.get("social_platform");

    Ok(StoredEntry {
        id: row.get("id"),
        image_hash: row.get("image_hash"),
        score: row.get::<i64, _>("score").clamp(0, 10) as u8,
        matched_keywords: split_keywords(&matched),
        male_subject: row.get::<i64, _>("male_subject") != 0,
        social_platform: platform.as_deref().and_then(SocialPlatform::parse),
        social_url: row.get("social_url"),
        podium_opt_in: row.get::<i64, _>("podium_opt_in") != 0,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Find an existing entry with the same content hash or the same data URL
pub async fn find_duplicate(
    pool: &SqlitePool,
    image_hash: &str,
    image_data_url: &str,
) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM entries WHERE image_hash = ? OR image_data_url = ? LIMIT 1",
    )
    .bind(image_hash)
    .bind(image_data_url)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Insert a scored entry
pub async fn insert_entry(pool: &SqlitePool, entry: &NewEntry) -> Result<InsertOutcome> {
    // Prepare all data before touching the database
    let result_json = serde_json::to_string(&entry.annotation)
        .map_err(|e| Error::Internal(format!("Failed to serialize annotation: {}", e)))?;
    let matched = entry.matched_keywords.join(",");
    let created_at = format_timestamp(&entry.created_at);
    let social_platform = entry.social.as_ref().map(|s| s.platform.as_str());
    let social_url = entry.social.as_ref().map(|s| s.url());

    let inserted = sqlx::query(
        r#"
        INSERT INTO entries (
            image_data_url, image_hash, result_json, score, matched_keywords,
            male_subject, social_platform, social_url, podium_opt_in, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.image_data_url)
    .bind(&entry.image_hash)
    .bind(&result_json)
    .bind(entry.score as i64)
    .bind(&matched)
    .bind(entry.male_subject as i64)
    .bind(social_platform)
    .bind(&social_url)
    .bind(entry.podium_opt_in as i64)
    .bind(&created_at)
    .execute(pool)
    .await;

    let id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::info!(image_hash = %entry.image_hash, "Insert rejected by unique image hash");
            return Ok(InsertOutcome::Duplicate);
        }
        Err(e) => return Err(Error::Database(e)),
    };

    tracing::info!(id, score = entry.score, "Leaderboard entry stored");

    Ok(InsertOutcome::Inserted(StoredEntry {
        id,
        image_hash: Some(entry.image_hash.clone()),
        score: entry.score,
        matched_keywords: entry.matched_keywords.clone(),
        male_subject: entry.male_subject,
        social_platform: entry.social.as_ref().map(|s| s.platform),
        social_url,
        podium_opt_in: entry.podium_opt_in,
        created_at: parse_timestamp(&created_at)?,
    }))
}

/// Load one entry (without image bytes)
pub async fn get_entry(pool: &SqlitePool, id: i64) -> Result<Option<StoredEntry>> {
    let row = sqlx::query(&format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_entry).transpose()
}

/// Load the stored image of one entry
pub async fn get_entry_image(pool: &SqlitePool, id: i64) -> Result<Option<EntryImage>> {
    let row = sqlx::query("SELECT image_data_url, image_hash, created_at FROM entries WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let created_at: String = row.get("created_at");
            Ok(Some(EntryImage {
                image_data_url: row.get("image_data_url"),
                image_hash: row.get("image_hash"),
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

fn order_clause(order: RankingOrder) -> &'static str {
    match order {
        RankingOrder::ScoreDesc => "score DESC, created_at DESC, id DESC",
        RankingOrder::ScoreAsc => "score ASC, created_at DESC, id DESC",
        RankingOrder::TimeDesc => "created_at DESC, id DESC",
        RankingOrder::TimeAsc => "created_at ASC, id ASC",
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Filtered, ordered leaderboard rows
pub async fn query_leaderboard(
    pool: &SqlitePool,
    filter: &LeaderboardFilter,
) -> Result<Vec<StoredEntry>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM entries WHERE score >= ",
        ENTRY_COLUMNS
    ));
    qb.push_bind(filter.min_score as i64);

    if filter.male_only {
        qb.push(" AND male_subject = 1");
    }
    if filter.podium_only {
        qb.push(" AND podium_opt_in = 1");
    }
    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let like = format!("%{}%", escape_like(&query.to_lowercase()));
        qb.push(" AND (lower(matched_keywords) LIKE ");
        qb.push_bind(like.clone());
        qb.push(" ESCAPE '\\' OR lower(result_json) LIKE ");
        qb.push_bind(like);
        qb.push(" ESCAPE '\\')");
    }

    qb.push(" ORDER BY ");
    qb.push(order_clause(filter.order));
    qb.push(" LIMIT ");
    qb.push_bind(filter.limit as i64);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(row_to_entry).collect()
}

/// Public leaderboard: eligible, opted-in entries, best first
pub async fn top_entries(pool: &SqlitePool, limit: u32) -> Result<Vec<StoredEntry>> {
    let filter = LeaderboardFilter {
        limit,
        podium_only: true,
        ..Default::default()
    };
    query_leaderboard(pool, &filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::SocialLink;
    use chrono::TimeZone;
    use pmlb_common::eligibility::rank;
    use pmlb_common::AnnotationResult;

    fn new_entry(hash: &str, score: u8, minute: u32) -> NewEntry {
        NewEntry {
            image_data_url: format!("data:image/png;base64,{}", hash),
            image_hash: hash.to_string(),
            annotation: AnnotationResult {
                description: format!("A man, entry {}", hash),
                ..Default::default()
            },
            score,
            matched_keywords: vec!["tote bag".into(), "tote".into()],
            male_subject: true,
            social: None,
            podium_opt_in: true,
            created_at: Utc.with_ymd_and_hms(2025, 8, 1, 12, minute, 0).unwrap(),
        }
    }

    async fn insert(pool: &SqlitePool, entry: NewEntry) -> StoredEntry {
        match insert_entry(pool, &entry).await.unwrap() {
            InsertOutcome::Inserted(stored) => stored,
            InsertOutcome::Duplicate => panic!("unexpected duplicate"),
        }
    }

    #[tokio::test]
    async fn test_insert_and_reload() {
        let pool = init_memory_pool().await.unwrap();
        let mut entry = new_entry("aaa", 6, 0);
        entry.social = SocialLink::new(SocialPlatform::Tiktok, "@vinyl");
        let stored = insert(&pool, entry).await;

        let loaded = get_entry(&pool, stored.id).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.matched_keywords, vec!["tote bag", "tote"]);
        assert_eq!(loaded.social_url.as_deref(), Some("https://tiktok.com/@vinyl"));

        let image = get_entry_image(&pool, stored.id).await.unwrap().unwrap();
        assert_eq!(image.image_hash.as_deref(), Some("aaa"));
        assert!(get_entry(&pool, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_hash_reports_duplicate() {
        let pool = init_memory_pool().await.unwrap();
        insert(&pool, new_entry("same", 5, 0)).await;

        let mut again = new_entry("same", 5, 1);
        again.image_data_url = "data:image/png;base64,other".into();
        assert_eq!(insert_entry(&pool, &again).await.unwrap(), InsertOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_find_duplicate_by_hash_or_data_url() {
        let pool = init_memory_pool().await.unwrap();
        let stored = insert(&pool, new_entry("h1", 5, 0)).await;

        assert_eq!(find_duplicate(&pool, "h1", "data:x").await.unwrap(), Some(stored.id));
        assert_eq!(
            find_duplicate(&pool, "other", "data:image/png;base64,h1").await.unwrap(),
            Some(stored.id)
        );
        assert_eq!(find_duplicate(&pool, "other", "data:x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sql_order_matches_ranking_policy() {
        let pool = init_memory_pool().await.unwrap();
        for (hash, score, minute) in [("a", 7, 1), ("b", 9, 0), ("c", 7, 5), ("d", 3, 9), ("e", 5, 2)] {
            insert(&pool, new_entry(hash, score, minute)).await;
        }

        for order in [
            RankingOrder::ScoreDesc,
            RankingOrder::ScoreAsc,
            RankingOrder::TimeDesc,
            RankingOrder::TimeAsc,
        ] {
            let filter = LeaderboardFilter {
                order,
                ..Default::default()
            };
            let from_sql = query_leaderboard(&pool, &filter).await.unwrap();
            let mut expected = from_sql.clone();
            let len = expected.len();
            rank(&mut expected, order, len);
            assert_eq!(from_sql, expected, "order {:?}", order);
        }
    }

    #[tokio::test]
    async fn test_filters() {
        let pool = init_memory_pool().await.unwrap();
        insert(&pool, new_entry("low", 2, 0)).await;
        insert(&pool, new_entry("high", 8, 1)).await;
        let mut no_subject = new_entry("nosubject", 9, 2);
        no_subject.male_subject = false;
        insert(&pool, no_subject).await;
        let mut hidden = new_entry("hidden", 7, 3);
        hidden.podium_opt_in = false;
        hidden.matched_keywords = vec!["labubu".into()];
        insert(&pool, hidden).await;

        let default_rows = query_leaderboard(&pool, &LeaderboardFilter::default()).await.unwrap();
        let hashes: Vec<_> = default_rows.iter().filter_map(|e| e.image_hash.clone()).collect();
        assert_eq!(hashes, vec!["high", "hidden"]);

        let top = top_entries(&pool, 25).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].image_hash.as_deref(), Some("high"));

        let searched = query_leaderboard(
            &pool,
            &LeaderboardFilter {
                query: Some("LABUBU".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].image_hash.as_deref(), Some("hidden"));

        let everything = query_leaderboard(
            &pool,
            &LeaderboardFilter {
                min_score: 0,
                male_only: false,
                limit: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(everything.len(), 2);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }
}
