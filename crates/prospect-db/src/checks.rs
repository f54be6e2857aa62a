//! Database operations for the `competitive_checks` and `keyword_validations`
//! tables. Check rows are immutable once written; inserts are deduplicated on
//! the derivative id so a re-run never records a second check of the same kind.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `competitive_checks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitiveCheckRow {
    pub id: i64,
    pub derived_product_id: i64,
    pub passed: bool,
    pub difficulty: String,
    pub content_gap: bool,
    pub big_site_count: i32,
    pub small_site_count: i32,
    pub reason: Option<String>,
    pub serp_snapshot: Value,
    pub analysis: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub struct NewCompetitiveCheck<'a> {
    pub derived_product_id: i64,
    pub passed: bool,
    pub difficulty: &'a str,
    pub content_gap: bool,
    pub big_site_count: i32,
    pub small_site_count: i32,
    pub reason: Option<&'a str>,
    pub serp_snapshot: Value,
    pub analysis: Option<&'a str>,
}

/// A row from the `keyword_validations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordValidationRow {
    pub id: i64,
    pub derived_product_id: i64,
    pub passed: bool,
    pub volume: String,
    pub difficulty: String,
    pub suggestion_count: i32,
    pub suggestion_sample: Value,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub struct NewKeywordValidation<'a> {
    pub derived_product_id: i64,
    pub passed: bool,
    pub volume: &'a str,
    pub difficulty: &'a str,
    pub suggestion_count: i32,
    pub suggestion_sample: Value,
    pub reason: Option<&'a str>,
}

/// Record a competitive check. Returns the new row's id, or `None` if this
/// derivative was already checked.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn insert_competitive_check(
    pool: &PgPool,
    check: &NewCompetitiveCheck<'_>,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO competitive_checks \
           (derived_product_id, passed, difficulty, content_gap, big_site_count, \
            small_site_count, reason, serp_snapshot, analysis) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (derived_product_id) DO NOTHING \
         RETURNING id",
    )
    .bind(check.derived_product_id)
    .bind(check.passed)
    .bind(check.difficulty)
    .bind(check.content_gap)
    .bind(check.big_site_count)
    .bind(check.small_site_count)
    .bind(check.reason)
    .bind(&check.serp_snapshot)
    .bind(check.analysis)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn get_competitive_check(
    pool: &PgPool,
    derived_product_id: i64,
) -> Result<Option<CompetitiveCheckRow>, DbError> {
    let row = sqlx::query_as::<_, CompetitiveCheckRow>(
        "SELECT id, derived_product_id, passed, difficulty, content_gap, big_site_count, \
                small_site_count, reason, serp_snapshot, analysis, checked_at \
         FROM competitive_checks \
         WHERE derived_product_id = $1",
    )
    .bind(derived_product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Record a keyword validation. Returns the new row's id, or `None` if this
/// derivative was already validated.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn insert_keyword_validation(
    pool: &PgPool,
    validation: &NewKeywordValidation<'_>,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO keyword_validations \
           (derived_product_id, passed, volume, difficulty, suggestion_count, \
            suggestion_sample, reason) \
         VALUES ($1, $2, $3::search_volume, $4, $5, $6, $7) \
         ON CONFLICT (derived_product_id) DO NOTHING \
         RETURNING id",
    )
    .bind(validation.derived_product_id)
    .bind(validation.passed)
    .bind(validation.volume)
    .bind(validation.difficulty)
    .bind(validation.suggestion_count)
    .bind(&validation.suggestion_sample)
    .bind(validation.reason)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn get_keyword_validation(
    pool: &PgPool,
    derived_product_id: i64,
) -> Result<Option<KeywordValidationRow>, DbError> {
    let row = sqlx::query_as::<_, KeywordValidationRow>(
        "SELECT id, derived_product_id, passed, volume::TEXT, difficulty, suggestion_count, \
                suggestion_sample, reason, checked_at \
         FROM keyword_validations \
         WHERE derived_product_id = $1",
    )
    .bind(derived_product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
