//! Queue transports.
//!
//! The enqueue side ([`JobTransport`]) is all a unit of work needs in order
//! to flush its deferred jobs. The worker side ([`JobSource`]) hands queued
//! jobs to a runner and records how they finished.

pub mod memory;
pub mod redis;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use prodkit_core::result::AppResult;

use crate::request::{JobHandle, JobRequest, Kwargs};

/// Hands job requests to a queue.
#[async_trait]
pub trait JobTransport: Send + Sync + Debug {
    /// Enqueue `request`.
    ///
    /// Returns `Ok(None)` when the transport already knows a job with the
    /// same id (queued, running or with a retained result); that is not an
    /// error.
    async fn enqueue(&self, request: &JobRequest) -> AppResult<Option<JobHandle>>;
}

/// Supplies queued jobs to a worker and records their outcome.
#[async_trait]
pub trait JobSource: Send + Sync + Debug {
    /// Take the next due job from `queue_name`, incrementing its try count.
    async fn dequeue(&self, queue_name: &str) -> AppResult<Option<QueuedJob>>;

    /// Remove a finished job and store its outcome according to `retention`.
    async fn finish(
        &self,
        job: &QueuedJob,
        outcome: &JobOutcome,
        retention: ResultRetention,
    ) -> AppResult<()>;

    /// Put `job` back on its queue, due after `delay`.
    async fn retry(&self, job: &QueuedJob, delay: Duration) -> AppResult<()>;

    /// Stored outcome of `job_id`, if one is retained.
    async fn result(&self, job_id: &str) -> AppResult<Option<JobOutcome>>;
}

/// A job taken off a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    /// Job id.
    pub job_id: String,
    /// Registered job name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments, including injected context entries.
    pub kwargs: Kwargs,
    /// Queue the job was taken from.
    pub queue_name: String,
    /// When the job was first enqueued.
    pub enqueue_time: DateTime<Utc>,
    /// Queue score (due time in epoch milliseconds).
    pub score: i64,
    /// One-based attempt number.
    pub job_try: u32,
}

/// How long to keep a finished job's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRetention {
    /// Do not store it.
    Discard,
    /// Store it for the given duration.
    For(Duration),
    /// Store it without expiry.
    Forever,
}

/// Recorded result of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Job name.
    pub name: String,
    /// Whether the job succeeded.
    pub success: bool,
    /// Return value on success, error message on failure.
    pub result: Value,
    /// Attempt that produced this outcome.
    pub job_try: u32,
    /// When the job finished.
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    /// Successful outcome for `job`.
    pub fn success(job: &QueuedJob, result: Value) -> Self {
        Self {
            name: job.name.clone(),
            success: true,
            result,
            job_try: job.job_try,
            finished_at: Utc::now(),
        }
    }

    /// Failed outcome for `job`.
    pub fn failure(job: &QueuedJob, message: impl Into<String>) -> Self {
        Self {
            name: job.name.clone(),
            success: false,
            result: Value::String(message.into()),
            job_try: job.job_try,
            finished_at: Utc::now(),
        }
    }
}

/// Job payload as stored by a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredJob {
    pub name: String,
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
    pub queue_name: String,
    pub enqueue_time_ms: i64,
}

impl StoredJob {
    pub(crate) fn from_request(request: &JobRequest, enqueue_time_ms: i64) -> Self {
        Self {
            name: request.name.clone(),
            args: request.args.clone(),
            kwargs: request.kwargs.clone(),
            queue_name: request.queue_name.clone(),
            enqueue_time_ms,
        }
    }

    pub(crate) fn into_queued(self, job_id: String, score: i64, job_try: u32) -> QueuedJob {
        QueuedJob {
            job_id,
            name: self.name,
            args: self.args,
            kwargs: self.kwargs,
            queue_name: self.queue_name,
            enqueue_time: DateTime::from_timestamp_millis(self.enqueue_time_ms)
                .unwrap_or_else(Utc::now),
            score,
            job_try,
        }
    }
}
