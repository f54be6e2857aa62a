//! Integration tests for `AiRouter` fallback and cooldown using wiremock.
//!
//! Every test pins the router's start picker to the healthiest candidate so
//! the attempt order is deterministic.

use std::time::Duration;

use serde::Deserialize;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prospect_ai::{AiRouter, ChatClient, GenerateRequest, ProviderKey, ProviderPool};

fn key(provider: &str, model: &str, base_url: &str) -> ProviderKey {
    ProviderKey {
        provider: provider.to_string(),
        model: model.to_string(),
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        error_count: 0,
        total_requests: 0,
        last_error: None,
    }
}

fn pinned_router(keys: Vec<ProviderKey>, attempt_timeout_secs: u64) -> AiRouter {
    let client = ChatClient::new(10).expect("client construction should not fail");
    AiRouter::new(ProviderPool::new(keys), client, attempt_timeout_secs, 60)
        .with_start_picker(|_| 0)
}

fn completion_body(content: &str, tokens_in: i64, tokens_out: i64) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": tokens_in,
            "completion_tokens": tokens_out,
            "total_tokens": tokens_in + tokens_out
        }
    })
}

fn quota_body() -> serde_json::Value {
    serde_json::json!({
        "error": { "message": "Rate limit reached for requests", "type": "requests" }
    })
}

#[tokio::test]
async fn quota_candidates_cool_down_and_are_skipped_on_the_next_call() {
    let server = MockServer::start().await;

    // First two candidates exhaust their quota; both should be hit exactly
    // once across the whole test because the cooldown absorbs the second call.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "alpha" })))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "beta" })))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "gamma" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("all good", 120, 40)))
        .expect(2)
        .mount(&server)
        .await;

    let router = pinned_router(
        vec![
            key("openai", "alpha", &server.uri()),
            key("groq", "beta", &server.uri()),
            key("mistral", "gamma", &server.uri()),
        ],
        5,
    );
    let request = GenerateRequest::new("say hi");

    let first = router.generate(&request).await;
    let generation = first.generation.expect("third candidate should win");
    assert_eq!(generation.text, "all good");
    assert_eq!(generation.model, "gamma");
    assert_eq!(first.attempts.len(), 3);
    assert!(!first.attempts[0].succeeded);
    assert!(!first.attempts[1].succeeded);
    assert!(first.attempts[2].succeeded);
    assert_eq!(first.attempts[2].tokens_in, 120);
    assert_eq!(first.attempts[2].tokens_out, 40);

    // Within the cooldown window the exhausted pairs are not re-attempted.
    let second = router.generate(&request).await;
    assert!(second.generation.is_some());
    assert_eq!(second.attempts.len(), 1);
    assert_eq!(second.attempts[0].model, "gamma");
}

#[tokio::test]
async fn attempt_timeout_is_recorded_as_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("too late", 10, 10))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let router = pinned_router(vec![key("openai", "slow-model", &server.uri())], 1);
    let reply = router.generate(&GenerateRequest::new("hurry")).await;

    assert!(reply.generation.is_none());
    assert_eq!(reply.attempts.len(), 1);
    assert!(!reply.attempts[0].succeeded);

    let health = router.provider_health().await;
    assert_eq!(health[0].error_count, 1);
    assert!(
        health[0]
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("timed out")),
        "timeout should be stored as the last error: {:?}",
        health[0].last_error
    );
}

#[tokio::test]
async fn exhausted_pool_returns_none_and_skips_everything_while_cooling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_body()))
        .expect(2)
        .mount(&server)
        .await;

    let router = pinned_router(
        vec![
            key("openai", "alpha", &server.uri()),
            key("groq", "beta", &server.uri()),
        ],
        5,
    );
    let request = GenerateRequest::new("anything");

    let first = router.generate(&request).await;
    assert!(first.generation.is_none());
    assert_eq!(first.attempts.len(), 2);

    // Both pairs are cooling, so the follow-up call makes zero attempts.
    let second = router.generate(&request).await;
    assert!(second.generation.is_none());
    assert!(second.attempts.is_empty());
}

#[derive(Debug, Deserialize)]
struct Verdict {
    score: i64,
    verdict: String,
}

#[tokio::test]
async fn generate_json_unwraps_fenced_reply() {
    let server = MockServer::start().await;

    let content = "Here is my assessment:\n```json\n{\"score\": 82, \"verdict\": \"build\"}\n```";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(content, 200, 60)))
        .mount(&server)
        .await;

    let router = pinned_router(vec![key("openai", "gpt-4o-mini", &server.uri())], 5);
    let reply = router
        .generate_json::<Verdict>(&GenerateRequest::new("assess this"))
        .await;

    let verdict = reply.value.expect("fenced JSON should parse");
    assert_eq!(verdict.score, 82);
    assert_eq!(verdict.verdict, "build");
    assert_eq!(reply.attempts.len(), 1);
    assert!(reply.attempts[0].succeeded);
}

#[tokio::test]
async fn generate_json_yields_none_for_prose_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("I would score this an 82.", 200, 20)),
        )
        .mount(&server)
        .await;

    let router = pinned_router(vec![key("openai", "gpt-4o-mini", &server.uri())], 5);
    let reply = router
        .generate_json::<Verdict>(&GenerateRequest::new("assess this"))
        .await;

    // The call itself succeeded and still counts toward the ledger.
    assert!(reply.value.is_none());
    assert_eq!(reply.attempts.len(), 1);
    assert!(reply.attempts[0].succeeded);
}

#[tokio::test]
async fn server_error_does_not_trigger_cooldown() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(2)
        .mount(&server)
        .await;

    let router = pinned_router(vec![key("openai", "flaky", &server.uri())], 5);
    let request = GenerateRequest::new("go");

    let first = router.generate(&request).await;
    assert!(first.generation.is_none());
    assert_eq!(first.attempts.len(), 1);

    // A plain 500 is not a quota signal: the pair is re-attempted on the
    // next call instead of entering cooldown.
    let second = router.generate(&request).await;
    assert!(second.generation.is_none());
    assert_eq!(second.attempts.len(), 1);

    let health = router.provider_health().await;
    assert_eq!(health[0].error_count, 2);
}
