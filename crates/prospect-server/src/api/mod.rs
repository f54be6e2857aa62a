mod derivatives;
mod opportunities;
mod runs;
mod signals;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use prospect_pipeline::PipelineContext;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
    REQUEST_ID_HEADER,
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const RATE_LIMIT_PER_MINUTE: usize = 120;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub pipeline: Arc<PipelineContext>,
}

/// Success envelope. Every 2xx payload rides in `data` next to the request
/// metadata, so clients parse one shape regardless of endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Error envelope. The `code` string doubles as the HTTP status selector,
/// see [`status_for`].
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let error = ErrorBody {
            code: code.into(),
            message: message.into(),
        };
        Self {
            error,
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (status_for(&self.error.code), Json(self)).into_response()
    }
}

fn status_for(code: &str) -> StatusCode {
    match code {
        "not_found" => StatusCode::NOT_FOUND,
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
        "conflict" => StatusCode::CONFLICT,
        "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Clamp a caller-supplied page size into the served range.
pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

pub(super) fn map_db_error(request_id: String, error: &prospect_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    // Only the verbs the route table serves; request ids may come from the
    // browser, so that header has to be allowed through preflight.
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/opportunities",
            get(opportunities::list_opportunities),
        )
        .route(
            "/api/v1/opportunities/{slug}",
            get(opportunities::get_opportunity).patch(opportunities::update_opportunity),
        )
        .route("/api/v1/derivatives", get(derivatives::list_derivatives))
        .route(
            "/api/v1/derivatives/{slug}/checks",
            get(derivatives::get_derivative_checks),
        )
        .route("/api/v1/runs/{stage}", post(runs::trigger_run))
        .route("/api/v1/budget", get(runs::budget_status))
        .route("/api/v1/signals", post(signals::ingest_signal))
        // Later layers wrap earlier ones: the rate limiter ends up outermost
        // and sees every request, auth only what it admits.
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    // /health stays outside auth so load balancers can probe it.
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(protected_router(auth, rate_limit))
        .layer(axum::middleware::from_fn(request_id))
        .layer(build_cors())
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let database = prospect_db::health_check(&state.pool).await;
    if let Err(e) = &database {
        tracing::warn!(error = %e, "health check: database unavailable");
    }
    let (status, data) = match database {
        Ok(()) => (
            StatusCode::OK,
            HealthData {
                status: "ok",
                database: "ok",
            },
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthData {
                status: "degraded",
                database: "unavailable",
            },
        ),
    };
    (
        status,
        Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(RATE_LIMIT_PER_MINUTE, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::opportunities::OpportunityItem;
    use super::runs::BudgetData;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state(pool: sqlx::PgPool) -> AppState {
        let config = prospect_core::load_app_config_from_env().expect("app config");
        let chat_client = prospect_ai::ChatClient::new(config.ai_timeout_secs).expect("client");
        let router = Arc::new(prospect_ai::AiRouter::new(
            prospect_ai::ProviderPool::default(),
            chat_client,
            config.ai_timeout_secs,
            config.ai_cooldown_secs,
        ));
        let pipeline = PipelineContext::new(
            pool.clone(),
            router,
            prospect_core::ScoringConfig::default(),
            &config,
        )
        .expect("pipeline context");
        AppState {
            pool,
            pipeline: Arc::new(pipeline),
        }
    }

    fn test_app(pool: sqlx::PgPool) -> Router {
        let auth = crate::middleware::AuthState::from_env(true).expect("auth");
        build_app(test_state(pool), auth, default_rate_limit_state())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).expect("encode body")))
            .expect("request")
    }

    async fn seed_opportunity(pool: &sqlx::PgPool, slug: &str, status: &str, score: i16) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO opportunities (title, slug, target_keyword, weighted_score, status) \
             VALUES ($1, $2, $3, $4, $5::opportunity_status) RETURNING id",
        )
        .bind(format!("Opportunity {slug}"))
        .bind(slug)
        .bind(format!("{slug} keyword"))
        .bind(score)
        .bind(status)
        .fetch_one(pool)
        .await
        .expect("insert opportunity")
    }

    async fn seed_derivative(pool: &sqlx::PgPool, opportunity_id: i64, slug: &str, score: i16) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO derived_products (opportunity_id, derivative_type, title, slug, score) \
             VALUES ($1, 'tool', $2, $3, $4) RETURNING id",
        )
        .bind(opportunity_id)
        .bind(format!("Derivative {slug}"))
        .bind(slug)
        .bind(score)
        .fetch_one(pool)
        .await
        .expect("insert derivative")
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn opportunity_item_is_serializable() {
        // Proves the type compiles and serde works — no DB needed.
        let item = OpportunityItem {
            public_id: Uuid::new_v4(),
            title: "Invoice deadline tracker".to_string(),
            slug: "invoice-deadline-tracker".to_string(),
            target_keyword: "invoice deadline tracker".to_string(),
            secondary_keywords: json!(["invoice reminders"]),
            category: Some("finance".to_string()),
            score_breakdown: json!({"business_viability": 70.0}),
            weighted_score: 72,
            window_status: "open".to_string(),
            window_closes_at: None,
            status: "evaluated".to_string(),
            decision_reason: None,
            created_at: Utc::now(),
        };
        let rendered = serde_json::to_string(&item).expect("serialize");
        assert!(rendered.contains("\"slug\":\"invoice-deadline-tracker\""));
        assert!(rendered.contains("\"weighted_score\":72"));
    }

    #[test]
    fn budget_data_serializes_decimal_fields_as_strings() {
        let data = BudgetData {
            spent_today: Decimal::new(123, 2),
            limit: Decimal::new(500, 2),
            exceeded: false,
            api_calls: 4,
            providers: Vec::new(),
        };
        let rendered: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&data).expect("serialize"))
                .expect("parse");
        assert_eq!(rendered["spent_today"].as_str(), Some("1.23"));
        assert_eq!(rendered["api_calls"].as_i64(), Some(4));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_ok_when_database_reachable(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["database"], "ok");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn opportunities_list_filters_by_status(pool: sqlx::PgPool) {
        seed_opportunity(&pool, "kept-opportunity", "evaluated", 82).await;
        seed_opportunity(&pool, "dropped-opportunity", "rejected", 40).await;

        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/opportunities?status=evaluated")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let rows = json["data"].as_array().expect("data array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["slug"], "kept-opportunity");
        assert_eq!(rows[0]["weighted_score"], 82);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn opportunities_list_rejects_unknown_status_filter(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/opportunities?status=archived")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn opportunity_detail_includes_derivatives(pool: sqlx::PgPool) {
        let opportunity_id = seed_opportunity(&pool, "detailed-opportunity", "evaluated", 78).await;
        seed_derivative(&pool, opportunity_id, "detailed-derivative", 75).await;

        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/opportunities/detailed-opportunity")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["slug"], "detailed-opportunity");
        let derivatives = json["data"]["derivatives"].as_array().expect("derivatives");
        assert_eq!(derivatives.len(), 1);
        assert_eq!(derivatives[0]["slug"], "detailed-derivative");
        assert_eq!(derivatives[0]["status"], "derived");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_opportunity_slug_is_not_found(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/opportunities/no-such-slug")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn opportunity_approval_updates_status(pool: sqlx::PgPool) {
        seed_opportunity(&pool, "approvable-opportunity", "evaluated", 85).await;

        let app = test_app(pool.clone());
        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/v1/opportunities/approvable-opportunity",
                &json!({"status": "approved"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["updated"], true);

        let status: String = sqlx::query_scalar(
            "SELECT status::TEXT FROM opportunities WHERE slug = 'approvable-opportunity'",
        )
        .fetch_one(&pool)
        .await
        .expect("status query");
        assert_eq!(status, "approved");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn opportunity_update_rejects_unknown_status(pool: sqlx::PgPool) {
        seed_opportunity(&pool, "frozen-opportunity", "evaluated", 65).await;

        let app = test_app(pool);
        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/v1/opportunities/frozen-opportunity",
                &json!({"status": "paused"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn derivatives_list_orders_by_score_and_filters_by_status(pool: sqlx::PgPool) {
        let opportunity_id = seed_opportunity(&pool, "spawning-opportunity", "evaluated", 88).await;
        seed_derivative(&pool, opportunity_id, "middling-derivative", 70).await;
        seed_derivative(&pool, opportunity_id, "strong-derivative", 90).await;
        seed_derivative(&pool, opportunity_id, "weak-derivative", 55).await;
        sqlx::query("UPDATE derived_products SET status = 'rejected' WHERE slug = 'weak-derivative'")
            .execute(&pool)
            .await
            .expect("reject derivative");

        let app = test_app(pool.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/derivatives")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let slugs: Vec<&str> = json["data"]
            .as_array()
            .expect("data array")
            .iter()
            .map(|row| row["slug"].as_str().expect("slug"))
            .collect();
        assert_eq!(
            slugs,
            vec!["strong-derivative", "middling-derivative", "weak-derivative"]
        );

        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/derivatives?status=derived")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let rows = json["data"].as_array().expect("data array");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["slug"], "strong-derivative");
        assert_eq!(rows[0]["score"], 90);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn derivative_checks_show_recorded_rows(pool: sqlx::PgPool) {
        let opportunity_id = seed_opportunity(&pool, "checked-opportunity", "evaluated", 80).await;
        let product_id = seed_derivative(&pool, opportunity_id, "checked-derivative", 80).await;
        prospect_db::insert_competitive_check(
            &pool,
            &prospect_db::NewCompetitiveCheck {
                derived_product_id: product_id,
                passed: true,
                difficulty: "moderate",
                content_gap: true,
                big_site_count: 2,
                small_site_count: 8,
                reason: None,
                serp_snapshot: json!([]),
                analysis: Some("winnable niche"),
            },
        )
        .await
        .expect("insert check");

        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/derivatives/checked-derivative/checks")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["competitive"]["passed"], true);
        assert_eq!(json["data"]["competitive"]["difficulty"], "moderate");
        assert!(json["data"]["keyword"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_run_stage_is_rejected(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/runs/cleanup")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn keywords_run_with_empty_queue_reports_no_work(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/runs/keywords")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["processed"], 0);
        assert_eq!(json["data"]["created"], 0);
        assert_eq!(json["data"]["rejected"], 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn signal_ingestion_dedupes_on_content_hash(pool: sqlx::PgPool) {
        let payload = json!({
            "source": "reddit",
            "source_url": "https://reddit.com/r/freelance/abc123",
            "title": "Need a tool that tracks invoice deadlines",
            "upvotes": 120,
            "comment_count": 31,
        });

        let first = test_app(pool.clone())
            .oneshot(json_request("POST", "/api/v1/signals", &payload))
            .await
            .expect("first response");
        assert_eq!(first.status(), StatusCode::CREATED);
        let first_json = body_json(first).await;
        assert_eq!(first_json["data"]["created"], true);
        assert!(first_json["data"]["id"].as_i64().is_some());

        let second = test_app(pool)
            .oneshot(json_request("POST", "/api/v1/signals", &payload))
            .await
            .expect("second response");
        assert_eq!(second.status(), StatusCode::OK);
        let second_json = body_json(second).await;
        assert_eq!(second_json["data"]["created"], false);
        assert!(second_json["data"]["id"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn signal_ingestion_rejects_blank_title(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/signals",
                &json!({"source": "reddit", "title": "   "}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn budget_reports_zero_spend_and_configured_pool(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/budget")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let spent: f64 = json["data"]["spent_today"]
            .as_str()
            .expect("spent_today string")
            .parse()
            .expect("numeric spend");
        assert!(spent.abs() < f64::EPSILON);
        assert_eq!(json["data"]["exceeded"], false);
        assert_eq!(json["data"]["api_calls"], 0);
        assert_eq!(json["data"]["providers"].as_array().map(Vec::len), Some(0));
    }
}
