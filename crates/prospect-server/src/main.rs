mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use prospect_ai::{AiRouter, ChatClient, ProviderPool};
use prospect_pipeline::PipelineContext;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(prospect_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = prospect_db::PoolConfig::from_app_config(&config);
    let pool = prospect_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = prospect_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "database migrations applied");
    }

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
    let pipeline = Arc::new(PipelineContext::new(
        pool.clone(),
        router,
        scoring,
        &config,
    )?);

    let _scheduler = scheduler::build_scheduler(pool.clone(), Arc::clone(&pipeline)).await?;

    let auth = AuthState::from_env(config.env.is_development())?;
    let app = build_app(AppState { pool, pipeline }, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "http server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
