//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring pipeline stage runs plus the hourly window refresh.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use prospect_pipeline::{PipelineContext, PipelineError, StageSummary};

/// Builds and starts the background job scheduler.
///
/// Registers all recurring pipeline jobs and starts the scheduler.
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    pipeline: Arc<PipelineContext>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_evaluate_job(&scheduler, Arc::clone(&pipeline)).await?;
    register_derive_job(&scheduler, Arc::clone(&pipeline)).await?;
    register_competitive_job(&scheduler, Arc::clone(&pipeline)).await?;
    register_keywords_job(&scheduler, pipeline).await?;
    register_window_refresh_job(&scheduler, pool).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

fn log_outcome(stage: &str, result: Result<StageSummary, PipelineError>) {
    match result {
        Ok(summary) => tracing::info!(
            stage,
            processed = summary.processed,
            created = summary.created,
            rejected = summary.rejected,
            "scheduler: stage run complete"
        ),
        Err(e) => tracing::error!(stage, error = %e, "scheduler: stage run failed"),
    }
}

/// Register the signal evaluation stage, every second hour at minute 15.
/// Collectors feed signals continuously; this keeps the raw queue short
/// without waking up for every insert.
async fn register_evaluate_job(
    scheduler: &JobScheduler,
    pipeline: Arc<PipelineContext>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 15 */2 * * *", move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move {
            tracing::info!("scheduler: starting evaluate run");
            log_outcome("evaluate", prospect_pipeline::run_evaluate(&pipeline).await);
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}

/// Register the derivative generation stage, daily at 03:10 UTC, after the
/// day's evaluate runs have settled scores.
async fn register_derive_job(
    scheduler: &JobScheduler,
    pipeline: Arc<PipelineContext>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 10 3 * * *", move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move {
            tracing::info!("scheduler: starting derive run");
            log_outcome("derive", prospect_pipeline::run_derive(&pipeline).await);
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}

/// Register the competitive gate, daily at 04:10 UTC, an hour behind derive
/// so fresh derivatives are waiting.
async fn register_competitive_job(
    scheduler: &JobScheduler,
    pipeline: Arc<PipelineContext>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 10 4 * * *", move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move {
            tracing::info!("scheduler: starting competitive gate run");
            log_outcome(
                "competitive",
                prospect_pipeline::run_competitive(&pipeline).await,
            );
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}

/// Register the keyword validation gate, daily at 05:10 UTC, last in the
/// nightly chain.
async fn register_keywords_job(
    scheduler: &JobScheduler,
    pipeline: Arc<PipelineContext>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 10 5 * * *", move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move {
            tracing::info!("scheduler: starting keyword validation run");
            log_outcome("keywords", prospect_pipeline::run_keywords(&pipeline).await);
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}

/// Register the hourly window refresh at minute 45. Reclassifies
/// `window_status` from `window_closes_at` as time passes, so read surfaces
/// stay truthful between scorer runs.
async fn register_window_refresh_job(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 45 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        Box::pin(async move {
            match prospect_db::refresh_window_statuses(&pool, chrono::Utc::now()).await {
                Ok(n) if n > 0 => {
                    tracing::info!(reclassified = n, "scheduler: window statuses refreshed");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "scheduler: window refresh failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}
