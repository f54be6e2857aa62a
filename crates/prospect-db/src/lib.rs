//! Postgres access for the prospect pipeline: pool construction, embedded
//! migrations, and one query module per table family. Query functions take a
//! `&PgPool` and return typed rows; none of them hold transactions open
//! across await points owned by callers.

pub mod checks;
pub mod costs;
pub mod derivatives;
pub mod opportunities;
pub mod signals;

use std::time::Duration;

use prospect_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub use checks::{
    get_competitive_check, get_keyword_validation, insert_competitive_check,
    insert_keyword_validation, CompetitiveCheckRow, KeywordValidationRow, NewCompetitiveCheck,
    NewKeywordValidation,
};
pub use costs::{daily_call_count, daily_spend, list_cost_records, record_usage, CostRecordRow};
pub use derivatives::{
    derivative_slug_exists, get_derived_product_by_slug, insert_derived_product,
    list_awaiting_competitive_check, list_awaiting_keyword_validation,
    list_derivatives_for_opportunity, list_derived_products, list_recent_derivative_keywords,
    reject_derived_product, set_competition_level, validate_derived_product, DerivativeKeywords,
    DerivedProductRow, NewDerivedProduct,
};
pub use opportunities::{
    get_opportunity_by_slug, insert_opportunity, list_derivation_candidates, list_opportunities,
    opportunity_slug_exists, recent_topic_sources, refresh_window_statuses,
    set_opportunity_status, NewOpportunity, OpportunityRow, TopicSource,
};
pub use signals::{
    count_signals_by_status, dismiss_merged_signals, insert_signal, list_raw_signals,
    mark_signals_evaluated, NewSignal, SignalRow,
};

// Migrations are embedded at compile time from <workspace-root>/migrations/.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Error type shared by every query and migration helper in this crate.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Pool sizing, resolved from [`AppConfig`] in the binaries. The defaults
/// suit a single-process deployment sharing one small Postgres instance.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

/// Whether an error is a Postgres unique-constraint violation. Duplicate keys
/// are an expected outcome in this pipeline (slug races, re-ingested signals)
/// and callers treat them as "already handled", not as failures.
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Open a Postgres pool for `database_url` with the given sizing.
///
/// # Errors
///
/// Returns the underlying [`sqlx::Error`] when no connection can be opened
/// within the acquire timeout.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Apply pending migrations and report how many ran.
///
/// # Errors
///
/// Returns [`DbError::Migration`] when a migration fails part-way; already
/// applied migrations are never re-run.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    let before = applied_migration_count(pool).await;
    MIGRATOR.run(pool).await?;
    let after = applied_migration_count(pool).await;
    Ok(usize::try_from((after - before).max(0)).unwrap_or(0))
}

async fn applied_migration_count(pool: &PgPool) -> i64 {
    // The bookkeeping table does not exist before the first run; read that
    // as zero applied.
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// Round-trip a trivial query to prove the pool can serve a connection.
///
/// # Errors
///
/// Returns the underlying [`sqlx::Error`] when the pool is unreachable.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Readiness probe used by the HTTP health endpoint.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] when the database does not answer.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_sizing_suits_a_single_process() {
        let sizing = PoolConfig::default();

        assert_eq!(sizing.max_connections, 10);
        assert_eq!(sizing.min_connections, 1);
        assert_eq!(sizing.acquire_timeout_secs, 10);
    }

    #[test]
    fn unique_violation_ignores_non_database_errors() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
