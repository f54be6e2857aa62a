use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use prospect_core::OpportunityStatus;

use crate::middleware::RequestId;

use super::derivatives::DerivativeItem;
use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct OpportunityItem {
    pub public_id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

/// Full record for the detail view: list fields plus the consumed signal ids,
/// the stored model assessment, and every derivative hanging off the row.
#[derive(Debug, Serialize)]
pub(super) struct OpportunityDetail {
    pub public_id: Uuid,
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
    pub signal_ids: Value,
    pub assessment: Value,
    pub derivatives: Vec<DerivativeItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpportunitiesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateOpportunityRequest {
    pub status: String,
    pub reason: Option<String>,
}

fn parse_status_filter(
    req_id: &str,
    raw: Option<&str>,
) -> Result<Option<&'static str>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => OpportunityStatus::parse(value)
            .map(|status| Some(status.as_str()))
            .map_err(|_| {
                ApiError::new(
                    req_id,
                    "validation_error",
                    format!("status must be evaluated, rejected, or approved, got '{value}'"),
                )
            }),
    }
}

pub(super) async fn list_opportunities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OpportunitiesQuery>,
) -> Result<Json<ApiResponse<Vec<OpportunityItem>>>, ApiError> {
    let status = parse_status_filter(&req_id.0, query.status.as_deref())?;
    let rows = prospect_db::list_opportunities(&state.pool, status, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| OpportunityItem {
            public_id: row.public_id,
            title: row.title,
            slug: row.slug,
            target_keyword: row.target_keyword,
            secondary_keywords: row.secondary_keywords,
            category: row.category,
            score_breakdown: row.score_breakdown,
            weighted_score: row.weighted_score,
            window_status: row.window_status,
            window_closes_at: row.window_closes_at,
            status: row.status,
            decision_reason: row.decision_reason,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_opportunity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<OpportunityDetail>>, ApiError> {
    let row = prospect_db::get_opportunity_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                &req_id.0,
                "not_found",
                format!("no opportunity with slug '{slug}'"),
            )
        })?;

    let derivatives = prospect_db::list_derivatives_for_opportunity(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .into_iter()
        .map(DerivativeItem::from_row)
        .collect();

    let data = OpportunityDetail {
        public_id: row.public_id,
        title: row.title,
        slug: row.slug,
        target_keyword: row.target_keyword,
        secondary_keywords: row.secondary_keywords,
        category: row.category,
        score_breakdown: row.score_breakdown,
        weighted_score: row.weighted_score,
        window_status: row.window_status,
        window_closes_at: row.window_closes_at,
        status: row.status,
        decision_reason: row.decision_reason,
        signal_ids: row.signal_ids,
        assessment: row.assessment,
        derivatives,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PATCH /api/v1/opportunities/{slug} — manual curation: approve a scored
/// opportunity, or reject it with an optional reason.
pub(super) async fn update_opportunity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
    Json(body): Json<UpdateOpportunityRequest>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let rid = &req_id.0;

    let status = match OpportunityStatus::parse(&body.status) {
        Ok(s @ (OpportunityStatus::Approved | OpportunityStatus::Rejected)) => s,
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                format!(
                    "status must be 'approved' or 'rejected', got '{}'",
                    body.status
                ),
            ))
        }
    };

    let updated = prospect_db::set_opportunity_status(
        &state.pool,
        &slug,
        status.as_str(),
        body.reason.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    if updated == 0 {
        return Err(ApiError::new(
            rid,
            "not_found",
            format!("no opportunity with slug '{slug}'"),
        ));
    }

    tracing::info!(slug = %slug, status = %status, "opportunity status updated");

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "updated": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
