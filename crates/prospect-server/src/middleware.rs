//! Request middleware: request-id propagation, bearer-token auth, and a
//! fixed-window rate limit. Auth and rate limiting wrap only the protected
//! routes; the request id wraps everything, including /health.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::Mutex;
use uuid::Uuid;

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id carried through handler extensions. Either taken from the
/// caller's `x-request-id` header or freshly generated.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer-token configuration. `None` means auth is switched off, which is
/// only ever allowed in development.
#[derive(Debug, Clone)]
pub struct AuthState {
    accepted: Option<Arc<HashSet<String>>>,
}

impl AuthState {
    /// Reads `PROSPECT_API_KEYS` (comma-separated tokens). Without any
    /// tokens the result is disabled auth in development and a startup
    /// error everywhere else.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("PROSPECT_API_KEYS").unwrap_or_default();
        let tokens = split_key_list(&raw);

        if !tokens.is_empty() {
            return Ok(Self {
                accepted: Some(Arc::new(tokens)),
            });
        }
        if is_development {
            tracing::warn!("PROSPECT_API_KEYS not set; bearer auth disabled in development");
            return Ok(Self { accepted: None });
        }
        anyhow::bail!("PROSPECT_API_KEYS must list at least one bearer token outside development")
    }

    fn verdict(&self, presented: Option<&str>) -> bool {
        match (&self.accepted, presented) {
            (None, _) => true,
            (Some(tokens), Some(value)) => tokens.contains(value),
            (Some(_), None) => false,
        }
    }
}

fn split_key_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Global fixed-window request limiter. One window for the whole process;
/// the protected surface is small enough that per-client buckets would be
/// overkill.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    limit: usize,
    period: Duration,
    counter: Arc<Mutex<Window>>,
}

#[derive(Debug)]
struct Window {
    opened: Instant,
    served: usize,
}

impl RateLimitState {
    #[must_use]
    pub fn new(limit: usize, period: Duration) -> Self {
        Self {
            limit,
            period,
            counter: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                served: 0,
            })),
        }
    }

    /// Whether one more request fits into the current window. Rolls the
    /// window over first when its period has lapsed.
    async fn admit(&self) -> bool {
        let mut window = self.counter.lock().await;
        if window.opened.elapsed() >= self.period {
            window.opened = Instant::now();
            window.served = 0;
        }
        if window.served >= self.limit {
            return false;
        }
        window.served += 1;
        true
    }
}

fn refusal(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    let body = serde_json::json!({ "error": { "code": code, "message": message } });
    (status, Json(body)).into_response()
}

/// Attaches a [`RequestId`] to the request extensions and echoes it back on
/// the response, reusing the caller's `x-request-id` header when present.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = incoming_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn incoming_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Rejects requests without an accepted bearer token. Passes everything
/// through when auth is disabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if auth.verdict(bearer_token(req.headers())) {
        next.run(req).await
    } else {
        refusal(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        )
    }
}

/// Refuses requests beyond the fixed per-window budget.
pub async fn enforce_rate_limit(
    State(limiter): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.admit().await {
        next.run(req).await
    } else {
        refusal(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "request budget for this window is spent",
        )
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_token_reads_the_authorization_header() {
        let headers = headers_with_auth("Bearer test-token");
        assert_eq!(bearer_token(&headers), Some("test-token"));
    }

    #[test]
    fn bearer_token_ignores_other_schemes_and_blank_tokens() {
        assert_eq!(bearer_token(&headers_with_auth("Basic abc123")), None);
        assert_eq!(bearer_token(&headers_with_auth("Bearer  ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn key_list_splits_trims_and_drops_empties() {
        let keys = split_key_list(" alpha , beta,,gamma ");
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("alpha"));
        assert!(keys.contains("gamma"));
        assert!(split_key_list("").is_empty());
    }

    #[test]
    fn disabled_auth_admits_anything() {
        let auth = AuthState { accepted: None };
        assert!(auth.verdict(None));
        assert!(auth.verdict(Some("whatever")));
    }

    #[test]
    fn enabled_auth_requires_a_listed_token() {
        let auth = AuthState {
            accepted: Some(Arc::new(split_key_list("alpha,beta"))),
        };
        assert!(auth.verdict(Some("beta")));
        assert!(!auth.verdict(Some("gamma")));
        assert!(!auth.verdict(None));
    }

    #[test]
    fn auth_from_env_stays_off_without_keys_in_development() {
        std::env::remove_var("PROSPECT_API_KEYS");
        let auth = AuthState::from_env(true).expect("development tolerates missing keys");
        assert!(auth.accepted.is_none());
    }

    #[tokio::test]
    async fn rate_limit_refuses_once_the_window_is_full() {
        let limiter = RateLimitState::new(2, Duration::from_secs(60));
        assert!(limiter.admit().await);
        assert!(limiter.admit().await);
        assert!(!limiter.admit().await);
    }

    #[tokio::test]
    async fn rate_limit_rolls_over_after_the_period() {
        let limiter = RateLimitState::new(1, Duration::from_millis(10));
        assert!(limiter.admit().await);
        assert!(!limiter.admit().await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.admit().await);
    }
}
