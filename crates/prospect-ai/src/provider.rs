//! Provider credential pool with per-key health counters.
//!
//! Keys are loaded from [`ProviderConfig`] entries, resolving each credential
//! through its configured environment variable. Entries whose credential or
//! base URL cannot be resolved are skipped with a warning rather than failing
//! startup, so one misconfigured provider never takes the whole pool down.

use std::env::VarError;

use serde::Serialize;

use prospect_core::ProviderConfig;

/// One credentialed (provider, model) entry with health counters.
///
/// Counters are process-local and reset on restart.
#[derive(Debug, Clone)]
pub struct ProviderKey {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub error_count: u32,
    pub total_requests: u32,
    pub last_error: Option<String>,
}

impl ProviderKey {
    /// Human-readable `provider/model` tag used in logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

/// Everything one attempt needs, snapshotted out of the pool so the pool
/// lock is not held across network calls.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
}

/// Health snapshot for one pool entry, exposed on the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub model: String,
    pub error_count: u32,
    pub total_requests: u32,
    pub last_error: Option<String>,
}

/// The ordered set of provider credentials the router selects from.
#[derive(Debug, Default)]
pub struct ProviderPool {
    keys: Vec<ProviderKey>,
}

/// Chat-completions base URL for providers we know; anything else must carry
/// an explicit `base_url` in its config entry.
fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        _ => None,
    }
}

impl ProviderPool {
    /// Builds a pool from pre-resolved keys. Used by tests and by callers
    /// that manage credentials themselves.
    #[must_use]
    pub fn new(keys: Vec<ProviderKey>) -> Self {
        Self { keys }
    }

    /// Resolves configured entries against process environment variables.
    #[must_use]
    pub fn from_configs(configs: &[ProviderConfig]) -> Self {
        Self::from_configs_with(configs, |name| std::env::var(name))
    }

    /// Resolves configured entries against an injectable variable lookup,
    /// so tests can supply credentials without touching the process env.
    pub fn from_configs_with<F>(configs: &[ProviderConfig], lookup: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let mut keys = Vec::with_capacity(configs.len());
        for config in configs {
            let api_key = match lookup(&config.api_key_env) {
                Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
                _ => {
                    tracing::warn!(
                        provider = %config.provider,
                        model = %config.model,
                        env = %config.api_key_env,
                        "credential env var missing or empty; skipping provider entry"
                    );
                    continue;
                }
            };

            let base_url = match config
                .base_url
                .as_deref()
                .or_else(|| default_base_url(&config.provider))
            {
                Some(url) => url.trim_end_matches('/').to_string(),
                None => {
                    tracing::warn!(
                        provider = %config.provider,
                        model = %config.model,
                        "no base_url configured and provider has no known default; skipping"
                    );
                    continue;
                }
            };

            keys.push(ProviderKey {
                provider: config.provider.clone(),
                model: config.model.clone(),
                api_key,
                base_url,
                error_count: 0,
                total_requests: 0,
                last_error: None,
            });
        }
        Self { keys }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Candidates sorted by ascending error count. The sort is stable, so
    /// entries with equal health keep their configured order.
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut order: Vec<&ProviderKey> = self.keys.iter().collect();
        order.sort_by_key(|key| key.error_count);
        order
            .into_iter()
            .map(|key| Candidate {
                provider: key.provider.clone(),
                model: key.model.clone(),
                api_key: key.api_key.clone(),
                base_url: key.base_url.clone(),
            })
            .collect()
    }

    pub fn record_success(&mut self, provider: &str, model: &str) {
        if let Some(key) = self.find_mut(provider, model) {
            key.total_requests += 1;
        }
    }

    pub fn record_failure(&mut self, provider: &str, model: &str, error: &str) {
        if let Some(key) = self.find_mut(provider, model) {
            key.total_requests += 1;
            key.error_count += 1;
            key.last_error = Some(error.to_string());
        }
    }

    /// Health snapshot of every entry, in configured order.
    #[must_use]
    pub fn health(&self) -> Vec<ProviderHealth> {
        self.keys
            .iter()
            .map(|key| ProviderHealth {
                provider: key.provider.clone(),
                model: key.model.clone(),
                error_count: key.error_count,
                total_requests: key.total_requests,
                last_error: key.last_error.clone(),
            })
            .collect()
    }

    fn find_mut(&mut self, provider: &str, model: &str) -> Option<&mut ProviderKey> {
        self.keys
            .iter_mut()
            .find(|key| key.provider == provider && key.model == model)
    }
}
