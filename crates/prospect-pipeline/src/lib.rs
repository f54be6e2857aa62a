//! Stage runners for the opportunity pipeline.
//!
//! Each stage is a single-pass batch job: load the work the previous stage
//! left behind, walk the items in order, and persist one decision per item
//! before moving on. Concurrency control lives in the database (unique keys
//! and `ON CONFLICT DO NOTHING`), so overlapping runs converge instead of
//! duplicating rows. Stages share a [`PipelineContext`] carrying the pool,
//! the model router, the budget governor and the external search clients.

pub mod budget;
pub mod cluster;
pub mod competitive;
pub mod derive;
pub mod error;
pub mod evaluate;
pub mod keywords;
pub mod normalize;
pub mod search;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;

use prospect_ai::{AiRouter, GenerateRequest};
use prospect_core::{AppConfig, ScoringConfig};

pub use budget::{BudgetGovernor, BudgetStatus};
pub use cluster::{group_by_topic, TopicGroup};
pub use competitive::run_competitive;
pub use derive::run_derive;
pub use error::PipelineError;
pub use evaluate::run_evaluate;
pub use keywords::run_keywords;
pub use search::{SerpClient, SerpResult, SuggestClient};

/// What a stage run did, returned to callers and logged at completion.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageSummary {
    /// Items the run looked at.
    pub processed: u32,
    /// Rows the run created or advanced.
    pub created: u32,
    /// Items the run rejected with a recorded reason.
    pub rejected: u32,
}

/// Shared dependencies for stage runs.
pub struct PipelineContext {
    pub pool: PgPool,
    pub router: Arc<AiRouter>,
    pub budget: BudgetGovernor,
    pub scoring: ScoringConfig,
    /// Absent when no SERP key is configured; the competitive gate then
    /// decides from the model estimate alone.
    pub serp: Option<SerpClient>,
    pub suggest: SuggestClient,
    pub evaluate_batch: i64,
    pub derive_batch: i64,
    pub gate_batch: i64,
}

impl PipelineContext {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if an HTTP client cannot be built.
    pub fn new(
        pool: PgPool,
        router: Arc<AiRouter>,
        scoring: ScoringConfig,
        config: &AppConfig,
    ) -> Result<Self, PipelineError> {
        let budget = BudgetGovernor::new(pool.clone(), config.daily_budget_usd);
        let serp = match config.serp_api_key.as_deref() {
            Some(key) => Some(SerpClient::new(
                key,
                &config.serp_base_url,
                config.http_timeout_secs,
            )?),
            None => None,
        };
        let suggest = SuggestClient::new(&config.suggest_base_url, config.http_timeout_secs)?;
        Ok(Self {
            pool,
            router,
            budget,
            scoring,
            serp,
            suggest,
            evaluate_batch: config.evaluate_batch_size,
            derive_batch: config.derive_batch_size,
            gate_batch: config.gate_batch_size,
        })
    }

    /// One routed JSON completion, with every attempt (won or lost) recorded
    /// against today's ledger under `stage` before the value is handed back.
    pub(crate) async fn assisted_json<T: DeserializeOwned>(
        &self,
        stage: &str,
        request: &GenerateRequest,
    ) -> Result<Option<T>, PipelineError> {
        let reply = self.router.generate_json::<T>(request).await;
        self.budget.record_attempts(stage, &reply.attempts).await?;
        Ok(reply.value)
    }
}
