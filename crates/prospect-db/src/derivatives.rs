//! Database operations for the `derived_products` table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `derived_products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DerivedProductRow {
    pub id: i64,
    pub public_id: Uuid,
    pub opportunity_id: i64,
    pub derivative_type: String,
    pub title: String,
    pub slug: String,
    pub target_keywords: Value,
    pub build_effort: String,
    pub competition_level: String,
    pub search_volume: String,
    pub product_form: String,
    pub monetization: Value,
    pub score: i16,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub idea_snapshot: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DerivedProductRow {
    /// Target keywords as plain strings, skipping any malformed entries.
    #[must_use]
    pub fn keywords(&self) -> Vec<String> {
        self.target_keywords
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct NewDerivedProduct<'a> {
    pub opportunity_id: i64,
    pub derivative_type: &'a str,
    pub title: &'a str,
    pub slug: &'a str,
    pub target_keywords: Value,
    pub build_effort: &'a str,
    pub competition_level: &'a str,
    pub search_volume: &'a str,
    pub product_form: &'a str,
    pub monetization: Value,
    pub score: i16,
    pub status: &'a str,
    pub rejection_reason: Option<&'a str>,
    pub idea_snapshot: Value,
}

/// Slug and keywords of a recent derivative, the inputs to the
/// keyword-overlap suppression check.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DerivativeKeywords {
    pub id: i64,
    pub slug: String,
    pub target_keywords: Value,
}

impl DerivativeKeywords {
    /// Keywords as plain strings, skipping any malformed entries.
    #[must_use]
    pub fn keywords(&self) -> Vec<String> {
        self.target_keywords
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Insert a derived product. Returns the new row's id, or `None` if the slug
/// is already taken.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn insert_derived_product(
    pool: &PgPool,
    product: &NewDerivedProduct<'_>,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO derived_products \
           (opportunity_id, derivative_type, title, slug, target_keywords, build_effort, \
            competition_level, search_volume, product_form, monetization, score, status, \
            rejection_reason, idea_snapshot) \
         VALUES ($1, $2::derivative_type, $3, $4, $5, $6::build_effort, \
                 $7::competition_level, $8::search_volume, $9::product_form, $10, $11, \
                 $12::derived_status, $13, $14) \
         ON CONFLICT (slug) DO NOTHING \
         RETURNING id",
    )
    .bind(product.opportunity_id)
    .bind(product.derivative_type)
    .bind(product.title)
    .bind(product.slug)
    .bind(&product.target_keywords)
    .bind(product.build_effort)
    .bind(product.competition_level)
    .bind(product.search_volume)
    .bind(product.product_form)
    .bind(&product.monetization)
    .bind(product.score)
    .bind(product.status)
    .bind(product.rejection_reason)
    .bind(&product.idea_snapshot)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn derivative_slug_exists(pool: &PgPool, slug: &str) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM derived_products WHERE slug = $1)",
    )
    .bind(slug)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Keywords of every non-rejected derivative created at or after `since`,
/// oldest first, for overlap suppression.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_recent_derivative_keywords(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<DerivativeKeywords>, DbError> {
    let rows = sqlx::query_as::<_, DerivativeKeywords>(
        "SELECT id, slug, target_keywords FROM derived_products \
         WHERE status <> 'rejected' AND created_at >= $1 \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Derived products still awaiting their competitive check, oldest first.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_awaiting_competitive_check(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<DerivedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, DerivedProductRow>(
        "SELECT dp.id, dp.public_id, dp.opportunity_id, dp.derivative_type::TEXT, dp.title, \
                dp.slug, dp.target_keywords, dp.build_effort::TEXT, dp.competition_level::TEXT, \
                dp.search_volume::TEXT, dp.product_form::TEXT, dp.monetization, dp.score, \
                dp.status::TEXT, dp.rejection_reason, dp.idea_snapshot, dp.created_at, \
                dp.updated_at \
         FROM derived_products dp \
         WHERE dp.status = 'derived' \
           AND NOT EXISTS \
               (SELECT 1 FROM competitive_checks cc WHERE cc.derived_product_id = dp.id) \
         ORDER BY dp.id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Derived products still awaiting keyword validation, oldest first.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_awaiting_keyword_validation(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<DerivedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, DerivedProductRow>(
        "SELECT dp.id, dp.public_id, dp.opportunity_id, dp.derivative_type::TEXT, dp.title, \
                dp.slug, dp.target_keywords, dp.build_effort::TEXT, dp.competition_level::TEXT, \
                dp.search_volume::TEXT, dp.product_form::TEXT, dp.monetization, dp.score, \
                dp.status::TEXT, dp.rejection_reason, dp.idea_snapshot, dp.created_at, \
                dp.updated_at \
         FROM derived_products dp \
         WHERE dp.status = 'derived' \
           AND NOT EXISTS \
               (SELECT 1 FROM keyword_validations kv WHERE kv.derived_product_id = dp.id) \
         ORDER BY dp.id ASC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// List derived products, highest score first, optionally filtered by status.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_derived_products(
    pool: &PgPool,
    status_filter: Option<&str>,
    limit: i64,
) -> Result<Vec<DerivedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, DerivedProductRow>(
        "SELECT id, public_id, opportunity_id, derivative_type::TEXT, title, slug, \
                target_keywords, build_effort::TEXT, competition_level::TEXT, \
                search_volume::TEXT, product_form::TEXT, monetization, score, status::TEXT, \
                rejection_reason, idea_snapshot, created_at, updated_at \
         FROM derived_products \
         WHERE ($1::TEXT IS NULL OR status = $1::derived_status) \
         ORDER BY score DESC, id DESC \
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
pub async fn get_derived_product_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<DerivedProductRow>, DbError> {
    let row = sqlx::query_as::<_, DerivedProductRow>(
        "SELECT id, public_id, opportunity_id, derivative_type::TEXT, title, slug, \
                target_keywords, build_effort::TEXT, competition_level::TEXT, \
                search_volume::TEXT, product_form::TEXT, monetization, score, status::TEXT, \
                rejection_reason, idea_snapshot, created_at, updated_at \
         FROM derived_products \
         WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All derivatives spawned from one opportunity, oldest first.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_derivatives_for_opportunity(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Vec<DerivedProductRow>, DbError> {
    let rows = sqlx::query_as::<_, DerivedProductRow>(
        "SELECT id, public_id, opportunity_id, derivative_type::TEXT, title, slug, \
                target_keywords, build_effort::TEXT, competition_level::TEXT, \
                search_volume::TEXT, product_form::TEXT, monetization, score, status::TEXT, \
                rejection_reason, idea_snapshot, created_at, updated_at \
         FROM derived_products \
         WHERE opportunity_id = $1 \
         ORDER BY id ASC",
    )
    .bind(opportunity_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Kill a derivative with a reason. Returns the number of rows updated.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn reject_derived_product(
    pool: &PgPool,
    id: i64,
    reason: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE derived_products SET \
           status = 'rejected', rejection_reason = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Annotate the assessed competition level after a passed competitive check.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn set_competition_level(pool: &PgPool, id: i64, level: &str) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE derived_products SET \
           competition_level = $2::competition_level, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(level)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Advance a derivative to validated, persisting the chosen volume estimate.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn validate_derived_product(
    pool: &PgPool,
    id: i64,
    search_volume: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE derived_products SET \
           status = 'validated', search_volume = $2::search_volume, updated_at = NOW() \
         WHERE id = $1 AND status = 'derived'",
    )
    .bind(id)
    .bind(search_volume)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
