use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct IngestSignalRequest {
    pub source: String,
    pub source_url: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub upvotes: i32,
    #[serde(default)]
    pub comment_count: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct IngestSignalResponse {
    /// `None` when an identical signal already existed.
    pub id: Option<i64>,
    pub created: bool,
}

/// POST /api/v1/signals — ingestion boundary for external collectors.
/// Deduplicates on the content hash of (source, title, normalized url), so
/// re-posting the same scrape is a no-op.
pub(super) async fn ingest_signal(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<IngestSignalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IngestSignalResponse>>), ApiError> {
    let rid = &req_id.0;

    let source = body.source.trim();
    let title = body.title.trim();
    if source.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "source must be non-empty",
        ));
    }
    if title.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "title must be non-empty",
        ));
    }
    if body.upvotes < 0 || body.comment_count < 0 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "upvotes and comment_count must be non-negative",
        ));
    }

    let content_hash =
        prospect_core::text::content_hash(source, title, body.source_url.as_deref());

    let id = prospect_db::insert_signal(
        &state.pool,
        &prospect_db::NewSignal {
            source,
            source_url: body.source_url.as_deref(),
            title,
            description: body.description.as_deref(),
            upvotes: body.upvotes,
            comment_count: body.comment_count,
            content_hash: &content_hash,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let created = id.is_some();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ApiResponse {
            data: IngestSignalResponse { id, created },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
