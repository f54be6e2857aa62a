//! Database operations for the `signals` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `signals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub public_id: Uuid,
    pub source: String,
    pub source_url: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub upvotes: i32,
    pub comment_count: i32,
    pub content_hash: String,
    pub status: String,
    pub status_reason: Option<String>,
    pub merged_into: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewSignal<'a> {
    pub source: &'a str,
    pub source_url: Option<&'a str>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub upvotes: i32,
    pub comment_count: i32,
    pub content_hash: &'a str,
}

/// Insert a signal, deduplicated on `content_hash`.
///
/// Returns the new row's id, or `None` if an identical signal already exists.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn insert_signal(pool: &PgPool, signal: &NewSignal<'_>) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO signals \
           (source, source_url, title, description, upvotes, comment_count, content_hash) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (content_hash) DO NOTHING \
         RETURNING id",
    )
    .bind(signal.source)
    .bind(signal.source_url)
    .bind(signal.title)
    .bind(signal.description)
    .bind(signal.upvotes)
    .bind(signal.comment_count)
    .bind(signal.content_hash)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Oldest-first batch of unprocessed signals for the evaluation stage.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_raw_signals(pool: &PgPool, limit: i64) -> Result<Vec<SignalRow>, DbError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT id, public_id, source, source_url, title, description, upvotes, \
                comment_count, content_hash, status::TEXT, status_reason, merged_into, \
                created_at, updated_at \
         FROM signals \
         WHERE status = 'raw' \
         ORDER BY created_at ASC, id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mark clustered-away signals as dismissed, recording which signal absorbed
/// them. Returns the number of rows updated.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn dismiss_merged_signals(
    pool: &PgPool,
    ids: &[i64],
    primary_id: i64,
) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE signals SET \
           status = 'dismissed', \
           status_reason = 'merged into signal ' || $2::TEXT, \
           merged_into = $2, \
           updated_at = NOW() \
         WHERE id = ANY($1) AND status = 'raw'",
    )
    .bind(ids)
    .bind(primary_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Mark signals as consumed by an opportunity decision. Returns the number of
/// rows updated.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn mark_signals_evaluated(pool: &PgPool, ids: &[i64]) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        "UPDATE signals SET status = 'evaluated', updated_at = NOW() \
         WHERE id = ANY($1) AND status IN ('raw', 'analyzed')",
    )
    .bind(ids)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Signal counts grouped by status, for operational summaries.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn count_signals_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>, DbError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status::TEXT, COUNT(*) FROM signals GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
