use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

use prospect_ai::ProviderHealth;
use prospect_pipeline::{PipelineError, StageSummary};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

/// Today's ledger plus the live provider pool, for operators deciding
/// whether a manual run is worth triggering.
#[derive(Debug, Serialize)]
pub(super) struct BudgetData {
    pub spent_today: Decimal,
    pub limit: Decimal,
    pub exceeded: bool,
    pub api_calls: i64,
    pub providers: Vec<ProviderHealth>,
}

fn map_pipeline_error(request_id: String, error: &PipelineError) -> ApiError {
    tracing::error!(error = %error, "pipeline call failed");
    ApiError::new(request_id, "internal_error", "pipeline call failed")
}

/// POST /api/v1/runs/{stage} — run one pipeline stage to completion and
/// report what it did. The run happens on the request; slow stages hold the
/// connection open.
pub(super) async fn trigger_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(stage): Path<String>,
) -> Result<Json<ApiResponse<StageSummary>>, ApiError> {
    let ctx = state.pipeline.as_ref();
    let result = match stage.as_str() {
        "evaluate" => prospect_pipeline::run_evaluate(ctx).await,
        "derive" => prospect_pipeline::run_derive(ctx).await,
        "competitive" => prospect_pipeline::run_competitive(ctx).await,
        "keywords" => prospect_pipeline::run_keywords(ctx).await,
        other => {
            return Err(ApiError::new(
                &req_id.0,
                "validation_error",
                format!(
                    "unknown stage '{other}'; expected evaluate, derive, competitive, or keywords"
                ),
            ))
        }
    };
    let summary = result.map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    tracing::info!(
        stage = %stage,
        processed = summary.processed,
        created = summary.created,
        rejected = summary.rejected,
        "stage run finished"
    );

    Ok(Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn budget_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<BudgetData>>, ApiError> {
    let status = state
        .pipeline
        .budget
        .status()
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;
    let providers = state.pipeline.router.provider_health().await;

    Ok(Json(ApiResponse {
        data: BudgetData {
            spent_today: status.spent_today,
            limit: status.daily_limit,
            exceeded: status.exceeded,
            api_calls: status.api_calls,
            providers,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
