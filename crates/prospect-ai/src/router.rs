//! Provider fallback routing for one logical generation request.
//!
//! Candidates are ordered by recorded health (ascending error count); the
//! starting candidate is picked uniformly at random among the top three so
//! load spreads across healthy keys, then the rest of the pool is tried in
//! health order. Pairs inside a quota cooldown window are skipped outright.
//! Exhaustion is not an error: callers receive `None` and must treat the
//! work item as "no assessment available".

use std::time::{Duration, Instant};

use rand::Rng;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::client::{ChatClient, ChatCompletion};
use crate::cooldown::CooldownCache;
use crate::error::{is_quota_signal, AiError};
use crate::json::extract_json_object;
use crate::provider::{Candidate, ProviderHealth, ProviderPool};

/// How many of the healthiest candidates the random start is drawn from.
const START_WINDOW: usize = 3;

type StartPicker = Box<dyn Fn(usize) -> usize + Send + Sync>;

/// One logical "generate" call, provider-agnostic.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.2,
            max_tokens: 1024,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The text that won, tagged with the pair that produced it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub provider: String,
    pub model: String,
    pub text: String,
}

/// Ledger line for one attempt, successful or not. Failed attempts carry
/// zero tokens; the call still counts against the day's ledger.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub provider: String,
    pub model: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub succeeded: bool,
}

/// Outcome of one routed call: at most one generation, every attempt made.
#[derive(Debug)]
pub struct RouterReply {
    pub generation: Option<Generation>,
    pub attempts: Vec<Attempt>,
}

/// Outcome of one routed JSON call.
#[derive(Debug)]
pub struct JsonReply<T> {
    pub value: Option<T>,
    pub attempts: Vec<Attempt>,
}

/// Routes generation requests across the provider pool with fallback,
/// health tracking, and per-pair quota cooldowns.
pub struct AiRouter {
    pool: Mutex<ProviderPool>,
    cooldowns: Mutex<CooldownCache>,
    client: ChatClient,
    attempt_timeout: Duration,
    start_picker: StartPicker,
}

impl AiRouter {
    #[must_use]
    pub fn new(
        pool: ProviderPool,
        client: ChatClient,
        attempt_timeout_secs: u64,
        cooldown_secs: u64,
    ) -> Self {
        Self {
            pool: Mutex::new(pool),
            cooldowns: Mutex::new(CooldownCache::new(Duration::from_secs(cooldown_secs))),
            client,
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
            start_picker: Box::new(|window| rand::rng().random_range(0..window)),
        }
    }

    /// Replaces the random start selection, letting tests pin the candidate
    /// order deterministically.
    #[must_use]
    pub fn with_start_picker(
        mut self,
        picker: impl Fn(usize) -> usize + Send + Sync + 'static,
    ) -> Self {
        self.start_picker = Box::new(picker);
        self
    }

    /// Runs one logical generation with fallback across the pool.
    ///
    /// First success wins; no further candidates are tried after it. When
    /// every candidate fails or is cooling down, `generation` is `None`.
    pub async fn generate(&self, request: &GenerateRequest) -> RouterReply {
        let candidates = self.pool.lock().await.candidates();
        let now = Instant::now();
        let available: Vec<Candidate> = {
            let mut cooldowns = self.cooldowns.lock().await;
            candidates
                .into_iter()
                .filter(|c| !cooldowns.is_cooling(&c.provider, &c.model, now))
                .collect()
        };

        if available.is_empty() {
            tracing::warn!("no provider candidates available; every pair is cooling or unconfigured");
            return RouterReply {
                generation: None,
                attempts: Vec::new(),
            };
        }

        let window = available.len().min(START_WINDOW);
        let start = (self.start_picker)(window).min(window - 1);

        let mut attempts = Vec::new();
        for idx in fallthrough_order(available.len(), start) {
            let candidate = &available[idx];
            match self.attempt(candidate, request).await {
                Ok(completion) => {
                    self.pool
                        .lock()
                        .await
                        .record_success(&candidate.provider, &candidate.model);
                    tracing::debug!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        tokens_in = completion.tokens_in,
                        tokens_out = completion.tokens_out,
                        "generation settled"
                    );
                    attempts.push(Attempt {
                        provider: candidate.provider.clone(),
                        model: candidate.model.clone(),
                        tokens_in: completion.tokens_in,
                        tokens_out: completion.tokens_out,
                        succeeded: true,
                    });
                    return RouterReply {
                        generation: Some(Generation {
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            text: completion.text,
                        }),
                        attempts,
                    };
                }
                Err(error) => {
                    let message = error.to_string();
                    self.pool
                        .lock()
                        .await
                        .record_failure(&candidate.provider, &candidate.model, &message);
                    attempts.push(Attempt {
                        provider: candidate.provider.clone(),
                        model: candidate.model.clone(),
                        tokens_in: 0,
                        tokens_out: 0,
                        succeeded: false,
                    });
                    if is_quota_signal(&message) {
                        self.cooldowns.lock().await.start(
                            &candidate.provider,
                            &candidate.model,
                            Instant::now(),
                        );
                        tracing::warn!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            "quota signature in provider error; pair entering cooldown"
                        );
                    } else {
                        tracing::warn!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            error = %message,
                            "provider attempt failed; falling through"
                        );
                    }
                }
            }
        }

        tracing::warn!(
            attempted = attempts.len(),
            "every provider candidate failed; returning no generation"
        );
        RouterReply {
            generation: None,
            attempts,
        }
    }

    /// JSON variant of [`AiRouter::generate`]: recovers the first balanced
    /// JSON object from the winning text and deserializes it. A reply that
    /// cannot be parsed yields `None`, logged with the raw text.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        request: &GenerateRequest,
    ) -> JsonReply<T> {
        let RouterReply {
            generation,
            attempts,
        } = self.generate(request).await;

        let Some(generation) = generation else {
            return JsonReply {
                value: None,
                attempts,
            };
        };

        let Some(raw) = extract_json_object(&generation.text) else {
            tracing::warn!(
                provider = %generation.provider,
                model = %generation.model,
                raw = %generation.text,
                "model reply contained no JSON object"
            );
            return JsonReply {
                value: None,
                attempts,
            };
        };

        match serde_json::from_str::<T>(raw) {
            Ok(value) => JsonReply {
                value: Some(value),
                attempts,
            },
            Err(error) => {
                tracing::warn!(
                    provider = %generation.provider,
                    model = %generation.model,
                    %error,
                    raw = %generation.text,
                    "model reply failed JSON parse"
                );
                JsonReply {
                    value: None,
                    attempts,
                }
            }
        }
    }

    /// Health snapshot of the pool for the status surface.
    pub async fn provider_health(&self) -> Vec<ProviderHealth> {
        self.pool.lock().await.health()
    }

    async fn attempt(
        &self,
        candidate: &Candidate,
        request: &GenerateRequest,
    ) -> Result<ChatCompletion, AiError> {
        match tokio::time::timeout(self.attempt_timeout, self.client.chat(candidate, request)).await
        {
            Ok(result) => result,
            Err(_) => Err(AiError::Timeout {
                secs: self.attempt_timeout.as_secs(),
            }),
        }
    }
}

/// Attempt order: the picked start first, then every other index in the
/// already health-sorted order.
fn fallthrough_order(count: usize, start: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(count);
    order.push(start);
    order.extend((0..count).filter(|idx| *idx != start));
    order
}
