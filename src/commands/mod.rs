//! CLI command definitions and dispatch.

pub mod provision;
pub mod serve;
pub mod worker;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use prodkit_core::config::AppConfig;
use prodkit_core::error::AppError;
use prodkit_database::PgEngineFactory;

/// ProdKit: multi-tenant web service with deferred background jobs
#[derive(Debug, Parser)]
#[command(name = "prodkit", version, about, long_about = None)]
pub struct Cli {
    /// Configuration overlay to load on top of `config/default.toml`
    #[arg(short, long, env = "PRODKIT_ENV", default_value = "development")]
    pub env: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),
    /// Start a background worker
    Worker(worker::WorkerArgs),
    /// Create a tenant schema without going through the queue
    Provision(provision::ProvisionArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load(&self.env)?;
        init_logging(&config);

        tracing::info!(
            "Starting {} v{} (env: {})",
            config.app.name,
            env!("CARGO_PKG_VERSION"),
            config.app.environment
        );

        match &self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Worker(args) => worker::execute(args, config).await,
            Commands::Provision(args) => provision::execute(args, config).await,
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Engine factory for the configured database.
fn engine_factory(config: &AppConfig) -> PgEngineFactory {
    PgEngineFactory::new(
        config.database.clone(),
        config.app.environment,
        config.app.debug,
    )
    .verify_connection(true)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
