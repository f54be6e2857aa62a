use std::net::SocketAddr;
use std::path::PathBuf;

use rust_decimal::Decimal;

/// Deployment environment. Only [`Environment::Development`] relaxes
/// operational guards; test and production behave identically here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub providers_path: PathBuf,
    pub scoring_path: PathBuf,
    /// Hard daily spending ceiling across all AI calls, in USD.
    pub daily_budget_usd: Decimal,
    pub ai_timeout_secs: u64,
    pub ai_cooldown_secs: u64,
    pub serp_api_key: Option<String>,
    pub serp_base_url: String,
    pub suggest_base_url: String,
    pub http_timeout_secs: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub evaluate_batch_size: i64,
    pub derive_batch_size: i64,
    pub gate_batch_size: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("providers_path", &self.providers_path)
            .field("scoring_path", &self.scoring_path)
            .field("database_url", &"[redacted]")
            .field("daily_budget_usd", &self.daily_budget_usd)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .field("ai_cooldown_secs", &self.ai_cooldown_secs)
            .field(
                "serp_api_key",
                &self.serp_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("serp_base_url", &self.serp_base_url)
            .field("suggest_base_url", &self.suggest_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("evaluate_batch_size", &self.evaluate_batch_size)
            .field("derive_batch_size", &self.derive_batch_size)
            .field("gate_batch_size", &self.gate_batch_size)
            .finish()
    }
}
