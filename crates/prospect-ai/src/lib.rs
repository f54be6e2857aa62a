//! Multi-provider LLM invocation for the prospect pipeline.
//!
//! A [`ProviderPool`] holds credentialed (provider, model) pairs with health
//! counters; the [`AiRouter`] executes one logical generate-text or
//! generate-JSON request against the pool with health-ordered fallback,
//! per-attempt timeouts, and a quota cooldown cache. Exhaustion yields
//! `None`, never an error, so pipeline stages degrade by skipping work items.

pub mod client;
pub mod cooldown;
pub mod error;
pub mod json;
pub mod pricing;
pub mod provider;
pub mod router;

pub use client::{ChatClient, ChatCompletion};
pub use cooldown::CooldownCache;
pub use error::{is_quota_signal, AiError};
pub use json::extract_json_object;
pub use pricing::{estimate_cost, is_lightweight_model};
pub use provider::{Candidate, ProviderHealth, ProviderKey, ProviderPool};
pub use router::{
    AiRouter, Attempt, GenerateRequest, Generation, JsonReply, RouterReply,
};
