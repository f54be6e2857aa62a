//! Daily spend governor.
//!
//! Every model attempt lands in the `cost_records` ledger, priced by
//! [`prospect_ai::estimate_cost`]; failed attempts are kept at zero cost so
//! the call count still reflects them. Stages consult [`BudgetGovernor::status`]
//! before spending, and again between items, so a long batch stops within one
//! item of the limit instead of sailing past it.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use prospect_ai::{estimate_cost, Attempt};

use crate::error::PipelineError;

/// A point-in-time reading of today's ledger against the configured limit.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub exceeded: bool,
    pub spent_today: Decimal,
    pub daily_limit: Decimal,
    pub api_calls: i64,
}

pub struct BudgetGovernor {
    pool: PgPool,
    daily_limit: Decimal,
}

impl BudgetGovernor {
    #[must_use]
    pub fn new(pool: PgPool, daily_limit: Decimal) -> Self {
        Self { pool, daily_limit }
    }

    /// Today's spend and call count, compared against the limit.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Db` on ledger query failure.
    pub async fn status(&self) -> Result<BudgetStatus, PipelineError> {
        let today = Utc::now().date_naive();
        let spent_today = prospect_db::daily_spend(&self.pool, today).await?;
        let api_calls = prospect_db::daily_call_count(&self.pool, today).await?;
        Ok(BudgetStatus {
            exceeded: is_exceeded(spent_today, self.daily_limit),
            spent_today,
            daily_limit: self.daily_limit,
            api_calls,
        })
    }

    /// Record a router call's attempts under `stage` in today's ledger.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Db` on ledger write failure.
    pub async fn record_attempts(
        &self,
        stage: &str,
        attempts: &[Attempt],
    ) -> Result<(), PipelineError> {
        let today = Utc::now().date_naive();
        for attempt in attempts {
            let cost = if attempt.succeeded {
                estimate_cost(&attempt.model, attempt.tokens_in, attempt.tokens_out)
            } else {
                Decimal::ZERO
            };
            prospect_db::record_usage(
                &self.pool,
                today,
                stage,
                &attempt.model,
                attempt.tokens_in,
                attempt.tokens_out,
                cost,
            )
            .await?;
        }
        Ok(())
    }
}

/// Spend meets or exceeds the limit. Reaching the limit exactly counts as
/// exceeded, so a zero limit disables all paid work.
#[must_use]
pub fn is_exceeded(spent: Decimal, limit: Decimal) -> bool {
    spent >= limit
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn limit_is_inclusive() {
        let limit = Decimal::from_str("5.00").unwrap();
        assert!(!is_exceeded(Decimal::from_str("4.99").unwrap(), limit));
        assert!(is_exceeded(Decimal::from_str("5.00").unwrap(), limit));
        assert!(is_exceeded(Decimal::from_str("5.01").unwrap(), limit));
    }

    #[test]
    fn zero_limit_blocks_any_spend() {
        assert!(is_exceeded(Decimal::ZERO, Decimal::ZERO));
    }
}
