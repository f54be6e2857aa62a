use clap::{Parser, Subcommand};

mod commands;

#[cfg(test)]
mod tests;

#[derive(Debug, Parser)]
#[command(name = "prospect-cli")]
#[command(about = "Prospect pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one pipeline stage now instead of waiting for the scheduler.
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Show today's spend, provider health, and signal queue depths.
    Status,
    /// List the highest-scoring opportunities.
    Top {
        /// How many rows to print.
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Opportunity status to list: evaluated, approved, or rejected.
        #[arg(long, default_value = "evaluated")]
        status: String,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity.
    Ping,
    /// Apply pending migrations.
    Migrate,
}

#[derive(Debug, Subcommand)]
enum RunCommands {
    /// Score raw signals into opportunities.
    Evaluate {
        /// Override the configured batch size for this run.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Generate derivative products for qualifying opportunities.
    Derive {
        /// Override the configured batch size for this run.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Check derived products against the live SERP competition.
    Competitive {
        /// Override the configured batch size for this run.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Validate keyword demand for products that passed the competitive gate.
    Keywords {
        /// Override the configured batch size for this run.
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("prospect-cli: no command given, try --help");
        return Ok(());
    };

    // Config first so a RUST_LOG in .env is visible to the subscriber.
    let config = prospect_core::load_app_config()?;
    tracing_subscriber::fmt::init();

    let pool_config = prospect_db::PoolConfig::from_app_config(&config);
    let pool = prospect_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => commands::run_db_ping(&pool).await?,
            DbCommands::Migrate => commands::run_db_migrate(&pool).await?,
        },
        Commands::Run { command } => commands::run_stage(pool, &config, command).await?,
        Commands::Status => commands::run_status(pool, &config).await?,
        Commands::Top { limit, status } => commands::run_top(&pool, &status, limit).await?,
    }

    Ok(())
}
