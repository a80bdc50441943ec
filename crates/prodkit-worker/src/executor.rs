//! Job executor: looks up a dequeued job's handler, drives it through the
//! lifecycle hooks and records the outcome with the queue.

use std::sync::Arc;
use std::time::Duration;

use prodkit_core::config::WorkerConfig;
use prodkit_core::error::AppError;

use crate::lifecycle::{JobContext, WorkerContext, on_job_end, on_job_start, run_job};
use crate::registry::{JobOptions, JobRegistry};
use crate::transport::{JobOutcome, JobSource, QueuedJob};

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, do not retry
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, may retry
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// The attempt ran past its timeout
    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// What happened to a job after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    /// Succeeded; the outcome was recorded.
    Completed,
    /// Failed retryably and was put back on the queue.
    Retried,
    /// Failed for good; the outcome was recorded.
    Failed,
}

/// Runs dequeued jobs against a [`JobRegistry`].
#[derive(Debug, Clone)]
pub struct JobExecutor {
    source: Arc<dyn JobSource>,
    registry: Arc<JobRegistry>,
    worker: WorkerContext,
    config: Arc<WorkerConfig>,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new(
        source: Arc<dyn JobSource>,
        registry: Arc<JobRegistry>,
        worker: WorkerContext,
        config: WorkerConfig,
    ) -> Self {
        Self {
            source,
            registry,
            worker,
            config: Arc::new(config),
        }
    }

    /// Queue this executor's jobs come from.
    pub fn source(&self) -> &Arc<dyn JobSource> {
        &self.source
    }

    /// Worker configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one attempt of `job` and settle it with the queue.
    pub async fn execute(&self, job: QueuedJob) -> JobDisposition {
        let Some(registered) = self.registry.get(&job.name) else {
            tracing::error!(job_id = %job.job_id, job_name = %job.name, "No handler registered for job");
            let message = format!("No handler registered for job '{}'", job.name);
            self.record_failure(&job, &JobOptions::default(), message).await;
            return JobDisposition::Failed;
        };

        tracing::info!(
            "Executing job: id={}, name='{}', attempt={}/{}",
            job.job_id,
            job.name,
            job.job_try,
            registered.options.effective_max_tries(&self.config)
        );

        let ctx = JobContext::new(self.worker.clone(), &job);
        let result = match on_job_start(&ctx).await {
            Ok(()) => {
                let timeout = registered.options.effective_timeout(&self.config);
                run_job(registered.handler.as_ref(), &ctx, &job, timeout).await
            }
            Err(e) => Err(JobExecutionError::Internal(e)),
        };
        on_job_end(&ctx).await;

        self.settle(&job, &registered.options, result).await
    }

    async fn settle(
        &self,
        job: &QueuedJob,
        options: &JobOptions,
        result: Result<serde_json::Value, JobExecutionError>,
    ) -> JobDisposition {
        match result {
            Ok(value) => {
                let outcome = JobOutcome::success(job, value);
                if let Err(e) = self
                    .source
                    .finish(job, &outcome, options.retention(&self.config))
                    .await
                {
                    tracing::error!("Failed to mark job {} as completed: {}", job.job_id, e);
                }
                tracing::info!("Job {} completed successfully", job.job_id);
                JobDisposition::Completed
            }
            Err(err) if err.is_retryable() && job.job_try < options.effective_max_tries(&self.config) => {
                let delay = Duration::from_secs(self.config.retry_delay_seconds * u64::from(job.job_try));
                tracing::warn!("Job {} failed (retrying in {:?}): {}", job.job_id, delay, err);
                if let Err(e) = self.source.retry(job, delay).await {
                    tracing::error!("Failed to retry job {}: {}", job.job_id, e);
                }
                JobDisposition::Retried
            }
            Err(err) => {
                tracing::error!("Job {} failed permanently: {}", job.job_id, err);
                self.record_failure(job, options, err.to_string()).await;
                JobDisposition::Failed
            }
        }
    }

    async fn record_failure(&self, job: &QueuedJob, options: &JobOptions, message: String) {
        let outcome = JobOutcome::failure(job, message);
        if let Err(e) = self
            .source
            .finish(job, &outcome, options.retention(&self.config))
            .await
        {
            tracing::error!("Failed to mark job {} as failed: {}", job.job_id, e);
        }
    }
}
