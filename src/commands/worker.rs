//! `prodkit worker`

use std::sync::Arc;

use clap::Args;
use tokio::sync::watch;

use prodkit_context::{ScopedContext, TenantContext};
use prodkit_core::config::AppConfig;
use prodkit_core::error::AppError;
use prodkit_database::SchemaResolver;
use prodkit_worker::{
    CronScheduler, JobExecutor, JobRegistry, JobSource, JobTransport, RedisQueue, WorkerRunner,
    jobs, on_shutdown, on_startup,
};

/// Arguments for the worker command
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Bind the worker's engine to this tenant's schema
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Queue to consume instead of `worker.default_queue_name`
    #[arg(short, long)]
    pub queue: Option<String>,

    /// Do not run periodic jobs in this process
    #[arg(long)]
    pub no_cron: bool,
}

/// Run a worker until a shutdown signal arrives.
pub async fn execute(args: &WorkerArgs, config: AppConfig) -> Result<(), AppError> {
    let tenant = TenantContext::new(args.tenant.clone(), None);
    tenant.scope(run(args, config)).await
}

async fn run(args: &WorkerArgs, config: AppConfig) -> Result<(), AppError> {
    let queue = Arc::new(RedisQueue::connect(&config.redis).await?);
    queue.ping().await?;
    let transport: Arc<dyn JobTransport> = queue.clone();
    let source: Arc<dyn JobSource> = queue;

    let worker = on_startup(
        Arc::clone(&transport),
        &super::engine_factory(&config),
        SchemaResolver::from_config(&config.database),
        &config.worker,
    )
    .await?;

    let registry = Arc::new(jobs::register_builtin(JobRegistry::builder()).build()?);
    let queue_name = args
        .queue
        .clone()
        .unwrap_or_else(|| config.worker.default_queue_name.clone());

    let mut scheduler = if args.no_cron {
        None
    } else {
        let scheduler = CronScheduler::new(transport, &queue_name).await?;
        scheduler.register(&registry).await?;
        scheduler.start().await?;
        Some(scheduler)
    };

    let executor = JobExecutor::new(source, registry, worker.clone(), config.worker.clone());
    let runner = WorkerRunner::new(executor).with_queue(queue_name);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        super::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    runner.run(shutdown_rx).await;

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }
    on_shutdown(&worker).await;
    Ok(())
}
