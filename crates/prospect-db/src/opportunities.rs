//! Database operations for the `opportunities` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `opportunities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OpportunityRow {
    pub id: i64,
    pub public_id: Uuid,
    pub signal_ids: Value,
    pub title: String,
    pub slug: String,
    pub target_keyword: String,
    pub secondary_keywords: Value,
    pub category: Option<String>,
    pub score_breakdown: Value,
    pub weighted_score: i16,
    pub window_status: String,
    pub window_closes_at: Option<DateTime<Utc>>,
    pub status: String,
    pub decision_reason: Option<String>,
    pub assessment: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewOpportunity<'a> {
    pub signal_ids: Value,
    pub title: &'a str,
    pub slug: &'a str,
    pub target_keyword: &'a str,
    pub secondary_keywords: Value,
    pub category: Option<&'a str>,
    pub score_breakdown: Value,
    pub weighted_score: i16,
    pub window_status: &'a str,
    pub window_closes_at: Option<DateTime<Utc>>,
    pub status: &'a str,
    pub decision_reason: Option<&'a str>,
    pub assessment: Value,
}

/// Title + target keyword of an existing opportunity, the inputs to the
/// semantic-dedup comparison.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicSource {
    pub title: String,
    pub target_keyword: String,
}

/// Insert an opportunity. Returns the new row's id, or `None` if the slug is
/// already taken (treated as "already exists", never an error).
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn insert_opportunity(
    pool: &PgPool,
    opportunity: &NewOpportunity<'_>,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO opportunities \
           (signal_ids, title, slug, target_keyword, secondary_keywords, category, \
            score_breakdown, weighted_score, window_status, window_closes_at, status, \
            decision_reason, assessment) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::window_status, $10, \
                 $11::opportunity_status, $12, $13) \
         ON CONFLICT (slug) DO NOTHING \
         RETURNING id",
    )
    .bind(&opportunity.signal_ids)
    .bind(opportunity.title)
    .bind(opportunity.slug)
    .bind(opportunity.target_keyword)
    .bind(&opportunity.secondary_keywords)
    .bind(opportunity.category)
    .bind(&opportunity.score_breakdown)
    .bind(opportunity.weighted_score)
    .bind(opportunity.window_status)
    .bind(opportunity.window_closes_at)
    .bind(opportunity.status)
    .bind(opportunity.decision_reason)
    .bind(&opportunity.assessment)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn opportunity_slug_exists(pool: &PgPool, slug: &str) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM opportunities WHERE slug = $1)",
    )
    .bind(slug)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// The most recently created opportunities' titles and keywords, newest
/// first, for duplicate-coverage comparison.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn recent_topic_sources(pool: &PgPool, limit: i64) -> Result<Vec<TopicSource>, DbError> {
    let rows = sqlx::query_as::<_, TopicSource>(
        "SELECT title, target_keyword FROM opportunities \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// List opportunities, best score first, optionally filtered by status.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_opportunities(
    pool: &PgPool,
    status_filter: Option<&str>,
    limit: i64,
) -> Result<Vec<OpportunityRow>, DbError> {
    let rows = sqlx::query_as::<_, OpportunityRow>(
        "SELECT id, public_id, signal_ids, title, slug, target_keyword, secondary_keywords, \
                category, score_breakdown, weighted_score, window_status::TEXT, \
                window_closes_at, status::TEXT, decision_reason, assessment, created_at, \
                updated_at \
         FROM opportunities \
         WHERE ($1::TEXT IS NULL OR status = $1::opportunity_status) \
         ORDER BY weighted_score DESC, id DESC \
         LIMIT $2",
    )
    .bind(status_filter)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn get_opportunity_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<OpportunityRow>, DbError> {
    let row = sqlx::query_as::<_, OpportunityRow>(
        "SELECT id, public_id, signal_ids, title, slug, target_keyword, secondary_keywords, \
                category, score_breakdown, weighted_score, window_status::TEXT, \
                window_closes_at, status::TEXT, decision_reason, assessment, created_at, \
                updated_at \
         FROM opportunities \
         WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Opportunities eligible for derivative generation: evaluated or approved,
/// at or above the score floor, and with no derivative yet.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_derivation_candidates(
    pool: &PgPool,
    min_score: i16,
    limit: i64,
) -> Result<Vec<OpportunityRow>, DbError> {
    let rows = sqlx::query_as::<_, OpportunityRow>(
        "SELECT o.id, o.public_id, o.signal_ids, o.title, o.slug, o.target_keyword, \
                o.secondary_keywords, o.category, o.score_breakdown, o.weighted_score, \
                o.window_status::TEXT, o.window_closes_at, o.status::TEXT, o.decision_reason, \
                o.assessment, o.created_at, o.updated_at \
         FROM opportunities o \
         WHERE o.status IN ('evaluated', 'approved') \
           AND o.weighted_score >= $1 \
           AND NOT EXISTS \
               (SELECT 1 FROM derived_products dp WHERE dp.opportunity_id = o.id) \
         ORDER BY o.weighted_score DESC, o.id ASC \
         LIMIT $2",
    )
    .bind(min_score)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Set an opportunity's status by slug. Returns the number of rows updated
/// (zero means the slug does not exist).
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn set_opportunity_status(
    pool: &PgPool,
    slug: &str,
    status: &str,
    reason: Option<&str>,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE opportunities SET \
           status = $2::opportunity_status, \
           decision_reason = COALESCE($3, decision_reason), \
           updated_at = NOW() \
         WHERE slug = $1",
    )
    .bind(slug)
    .bind(status)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Reclassify window statuses from `window_closes_at` relative to `now`.
/// Returns the number of opportunities whose window actually changed.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn refresh_window_statuses(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query(
        "WITH reclassified AS ( \
             SELECT id, \
                    CASE \
                        WHEN window_closes_at <= $1 THEN 'closed'::window_status \
                        WHEN window_closes_at <= $1 + INTERVAL '3 days' THEN 'closing'::window_status \
                        WHEN window_closes_at <= $1 + INTERVAL '30 days' THEN 'open'::window_status \
                        ELSE 'upcoming'::window_status \
                    END AS next_status \
             FROM opportunities \
             WHERE window_closes_at IS NOT NULL \
         ) \
         UPDATE opportunities o \
         SET window_status = r.next_status, updated_at = NOW() \
         FROM reclassified r \
         WHERE o.id = r.id AND o.window_status <> r.next_status",
    )
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
