//! Worker runner: main loop that polls a queue and executes jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::time;

use crate::executor::JobExecutor;

/// Main worker runner that polls a queue and executes jobs
#[derive(Debug)]
pub struct WorkerRunner {
    /// Job executor for dispatching
    executor: JobExecutor,
    /// Queue to poll
    queue_name: String,
}

impl WorkerRunner {
    /// Create a runner polling the configured default queue.
    pub fn new(executor: JobExecutor) -> Self {
        let queue_name = executor.config().default_queue_name.clone();
        Self {
            executor,
            queue_name,
        }
    }

    /// Poll `queue_name` instead of the default queue.
    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Start the worker runner; runs until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let config = self.executor.config();
        tracing::info!(
            "Worker started with concurrency={}, poll_interval={}ms, queue={}",
            config.concurrency,
            config.poll_interval_ms,
            self.queue_name
        );

        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Worker received shutdown signal");
                        break;
                    }
                }
                picked = self.poll_and_execute(&semaphore) => {
                    if picked {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.changed() => {
                            if *cancel.borrow() {
                                tracing::info!("Worker shutting down");
                                break;
                            }
                        }
                        _ = time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!("Worker waiting for in-flight jobs to complete...");

        let max_permits = u32::try_from(config.concurrency.max(1)).unwrap_or(u32::MAX);
        let grace = Duration::from_secs(config.shutdown_grace_seconds);
        if time::timeout(grace, semaphore.acquire_many(max_permits))
            .await
            .is_err()
        {
            tracing::warn!("In-flight jobs still running after {:?}, giving up", grace);
        }

        tracing::info!("Worker shut down complete");
    }

    /// Poll for a job and spawn it if one is due. Returns whether a job was
    /// picked up.
    async fn poll_and_execute(&self, semaphore: &Arc<Semaphore>) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied, waiting...");
                return false;
            }
        };

        match self.executor.source().dequeue(&self.queue_name).await {
            Ok(Some(job)) => {
                let executor = self.executor.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let job_id = job.job_id.clone();
                    let disposition = executor.execute(job).await;
                    tracing::debug!("Job {} settled as {:?}", job_id, disposition);
                });
                true
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No jobs available in queue");
                false
            }
            Err(e) => {
                drop(permit);
                tracing::error!("Failed to dequeue job: {}", e);
                false
            }
        }
    }
}
