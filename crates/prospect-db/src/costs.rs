//! Database operations for the `cost_records` spend ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `cost_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CostRecordRow {
    pub id: i64,
    pub usage_date: NaiveDate,
    pub stage: String,
    pub model: String,
    pub call_count: i32,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_usd: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record one router attempt against the (date, stage, model) ledger row,
/// creating it on first use. Failed attempts are recorded with zero tokens
/// and zero cost so the call count still reflects them.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn record_usage(
    pool: &PgPool,
    usage_date: NaiveDate,
    stage: &str,
    model: &str,
    tokens_in: i64,
    tokens_out: i64,
    cost_usd: Decimal,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO cost_records \
           (usage_date, stage, model, call_count, tokens_in, tokens_out, cost_usd) \
         VALUES ($1, $2, $3, 1, $4, $5, $6) \
         ON CONFLICT (usage_date, stage, model) DO UPDATE SET \
           call_count = cost_records.call_count + 1, \
           tokens_in = cost_records.tokens_in + EXCLUDED.tokens_in, \
           tokens_out = cost_records.tokens_out + EXCLUDED.tokens_out, \
           cost_usd = cost_records.cost_usd + EXCLUDED.cost_usd, \
           updated_at = NOW()",
    )
    .bind(usage_date)
    .bind(stage)
    .bind(model)
    .bind(tokens_in)
    .bind(tokens_out)
    .bind(cost_usd)
    .execute(pool)
    .await?;
    Ok(())
}

/// Total spend recorded for one day across all stages and models.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn daily_spend(pool: &PgPool, usage_date: NaiveDate) -> Result<Decimal, DbError> {
    let total = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(cost_usd), 0) FROM cost_records WHERE usage_date = $1",
    )
    .bind(usage_date)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Total call count recorded for one day.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn daily_call_count(pool: &PgPool, usage_date: NaiveDate) -> Result<i64, DbError> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(call_count), 0)::BIGINT FROM cost_records WHERE usage_date = $1",
    )
    .bind(usage_date)
    .fetch_one(pool)
    .await?;
    Ok(total)
}

/// Per-stage/model ledger rows for one day, for operational summaries.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_cost_records(
    pool: &PgPool,
    usage_date: NaiveDate,
) -> Result<Vec<CostRecordRow>, DbError> {
    let rows = sqlx::query_as::<_, CostRecordRow>(
        "SELECT id, usage_date, stage, model, call_count, tokens_in, tokens_out, cost_usd, \
                created_at, updated_at \
         FROM cost_records \
         WHERE usage_date = $1 \
         ORDER BY stage, model",
    )
    .bind(usage_date)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
