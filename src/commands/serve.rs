//! `prodkit serve`

use std::sync::Arc;

use clap::Args;

use prodkit_api::AppState;
use prodkit_core::config::AppConfig;
use prodkit_core::error::AppError;
use prodkit_database::{EngineFactory, ProcessName, SchemaResolver};
use prodkit_worker::RedisQueue;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the configured bind port
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<(), AppError> {
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let queue = RedisQueue::connect(&config.redis).await?;
    queue.ping().await?;

    let schema = SchemaResolver::from_config(&config.database).resolve(None);
    let engine = super::engine_factory(&config)
        .create_engine(ProcessName::App, &schema)
        .await?;

    let state = AppState::new(config, Arc::new(queue), engine.clone());
    let served = prodkit_api::serve(state, super::shutdown_signal()).await;

    engine.dispose().await;
    tracing::info!("Server shut down gracefully");
    served
}
