use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use prospect_core::DerivedStatus;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct DerivativeItem {
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
    pub created_at: DateTime<Utc>,
}

impl DerivativeItem {
    pub(super) fn from_row(row: prospect_db::DerivedProductRow) -> Self {
        Self {
            public_id: row.public_id,
            opportunity_id: row.opportunity_id,
            derivative_type: row.derivative_type,
            title: row.title,
            slug: row.slug,
            target_keywords: row.target_keywords,
            build_effort: row.build_effort,
            competition_level: row.competition_level,
            search_volume: row.search_volume,
            product_form: row.product_form,
            monetization: row.monetization,
            score: row.score,
            status: row.status,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        }
    }
}

/// Gate outcomes for one derivative. A `None` check means the gate has not
/// reached the product yet.
#[derive(Debug, Serialize)]
pub(super) struct DerivativeChecksResponse {
    pub slug: String,
    pub status: String,
    pub competitive: Option<CompetitiveCheckItem>,
    pub keyword: Option<KeywordValidationItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct CompetitiveCheckItem {
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

#[derive(Debug, Serialize)]
pub(super) struct KeywordValidationItem {
    pub passed: bool,
    pub volume: String,
    pub difficulty: String,
    pub suggestion_count: i32,
    pub suggestion_sample: Value,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DerivativesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

fn parse_status_filter(
    req_id: &str,
    raw: Option<&str>,
) -> Result<Option<&'static str>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => DerivedStatus::parse(value)
            .map(|status| Some(status.as_str()))
            .map_err(|_| {
                ApiError::new(
                    req_id,
                    "validation_error",
                    format!("status must be derived, validated, or rejected, got '{value}'"),
                )
            }),
    }
}

pub(super) async fn list_derivatives(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DerivativesQuery>,
) -> Result<Json<ApiResponse<Vec<DerivativeItem>>>, ApiError> {
    let status = parse_status_filter(&req_id.0, query.status.as_deref())?;
    let rows = prospect_db::list_derived_products(&state.pool, status, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(DerivativeItem::from_row).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_derivative_checks(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<DerivativeChecksResponse>>, ApiError> {
    let product = prospect_db::get_derived_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                &req_id.0,
                "not_found",
                format!("no derivative with slug '{slug}'"),
            )
        })?;

    let competitive = prospect_db::get_competitive_check(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .map(|row| CompetitiveCheckItem {
            passed: row.passed,
            difficulty: row.difficulty,
            content_gap: row.content_gap,
            big_site_count: row.big_site_count,
            small_site_count: row.small_site_count,
            reason: row.reason,
            serp_snapshot: row.serp_snapshot,
            analysis: row.analysis,
            checked_at: row.checked_at,
        });

    let keyword = prospect_db::get_keyword_validation(&state.pool, product.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .map(|row| KeywordValidationItem {
            passed: row.passed,
            volume: row.volume,
            difficulty: row.difficulty,
            suggestion_count: row.suggestion_count,
            suggestion_sample: row.suggestion_sample,
            reason: row.reason,
            checked_at: row.checked_at,
        });

    let data = DerivativeChecksResponse {
        slug: product.slug,
        status: product.status,
        competitive,
        keyword,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
