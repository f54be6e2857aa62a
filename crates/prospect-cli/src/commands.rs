//! Command handlers. Argument parsing stays in `main`; each handler owns its
//! own output.

use std::sync::Arc;

use prospect_ai::{AiRouter, ChatClient, ProviderPool};
use prospect_core::{AppConfig, OpportunityStatus};
use prospect_pipeline::PipelineContext;
use sqlx::PgPool;

use crate::RunCommands;

pub(crate) async fn run_db_ping(pool: &PgPool) -> anyhow::Result<()> {
    prospect_db::ping(pool).await?;
    println!("database ok");
    Ok(())
}

pub(crate) async fn run_db_migrate(pool: &PgPool) -> anyhow::Result<()> {
    let applied = prospect_db::run_migrations(pool).await?;
    if applied == 0 {
        println!("database is up to date");
    } else {
        println!("migrations applied: {applied}");
    }
    Ok(())
}

/// Run a single pipeline stage and print its summary. A `--limit` override
/// replaces the configured batch size for this invocation only.
pub(crate) async fn run_stage(
    pool: PgPool,
    config: &AppConfig,
    command: RunCommands,
) -> anyhow::Result<()> {
    let mut ctx = build_pipeline(pool, config)?;
    let (stage, summary) = match command {
        RunCommands::Evaluate { limit } => {
            if let Some(limit) = limit {
                ctx.evaluate_batch = i64::from(limit);
            }
            ("evaluate", prospect_pipeline::run_evaluate(&ctx).await?)
        }
        RunCommands::Derive { limit } => {
            if let Some(limit) = limit {
                ctx.derive_batch = i64::from(limit);
            }
            ("derive", prospect_pipeline::run_derive(&ctx).await?)
        }
        RunCommands::Competitive { limit } => {
            if let Some(limit) = limit {
                ctx.gate_batch = i64::from(limit);
            }
            ("competitive", prospect_pipeline::run_competitive(&ctx).await?)
        }
        RunCommands::Keywords { limit } => {
            if let Some(limit) = limit {
                ctx.gate_batch = i64::from(limit);
            }
            ("keywords", prospect_pipeline::run_keywords(&ctx).await?)
        }
    };

    println!(
        "{stage}: processed {}, created {}, rejected {}",
        summary.processed, summary.created, summary.rejected
    );
    Ok(())
}

pub(crate) async fn run_status(pool: PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let ctx = build_pipeline(pool.clone(), config)?;

    let budget = ctx.budget.status().await?;
    let exceeded = if budget.exceeded { " (exceeded)" } else { "" };
    println!(
        "budget: {} of {} USD spent today across {} API calls{exceeded}",
        budget.spent_today, budget.daily_limit, budget.api_calls
    );

    let counts = prospect_db::count_signals_by_status(&pool).await?;
    if counts.is_empty() {
        println!("signals: none");
    } else {
        let parts: Vec<String> = counts
            .iter()
            .map(|(status, count)| format!("{count} {status}"))
            .collect();
        println!("signals: {}", parts.join(", "));
    }

    let health = ctx.router.provider_health().await;
    if health.is_empty() {
        println!("providers: none configured");
    } else {
        println!("providers:");
        for provider in health {
            let last_error = provider
                .last_error
                .as_deref()
                .map_or_else(String::new, |e| format!(", last error: {e}"));
            println!(
                "  {}/{}: {} errors in {} requests{last_error}",
                provider.provider, provider.model, provider.error_count, provider.total_requests
            );
        }
    }

    Ok(())
}

pub(crate) async fn run_top(pool: &PgPool, status: &str, limit: u32) -> anyhow::Result<()> {
    let status = OpportunityStatus::parse(status)?;
    let rows =
        prospect_db::list_opportunities(pool, Some(status.as_str()), i64::from(limit)).await?;
    if rows.is_empty() {
        println!("no {} opportunities", status.as_str());
        return Ok(());
    }

    println!("{:>5}  {:<8}  {:<40}  {}", "score", "window", "slug", "title");
    for row in rows {
        println!(
            "{:>5}  {:<8}  {:<40}  {}",
            row.weighted_score, row.window_status, row.slug, row.title
        );
    }
    Ok(())
}

/// Assemble the same pipeline context the server runs with. Provider
/// credentials may be absent; the router then skips AI work rather than
/// failing the command.
fn build_pipeline(pool: PgPool, config: &AppConfig) -> anyhow::Result<PipelineContext> {
    let providers = prospect_core::load_providers(&config.providers_path)?;
    let provider_pool = ProviderPool::from_configs(&providers.providers);
    if provider_pool.is_empty() {
        tracing::warn!("no provider credentials resolved; AI-assisted stages will skip their work");
    }

    let chat_client = ChatClient::new(config.ai_timeout_secs)?;
    let router = Arc::new(AiRouter::new(
        provider_pool,
        chat_client,
        config.ai_timeout_secs,
        config.ai_cooldown_secs,
    ));
    let scoring = prospect_core::load_scoring(&config.scoring_path)?;

    Ok(PipelineContext::new(pool, router, scoring, config)?)
}
