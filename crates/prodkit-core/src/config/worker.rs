//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent job processing tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval in milliseconds between polls of an empty queue.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Queue used when a job is enqueued without an explicit queue.
    #[serde(default = "default_queue_name")]
    pub default_queue_name: String,
    /// Default per-job timeout in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
    /// Default maximum number of attempts per job.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Default result retention in seconds (0 disables retention).
    #[serde(default = "default_keep_result")]
    pub keep_result_seconds: u64,
    /// Base delay before a transient failure is retried, multiplied by the attempt number.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            default_queue_name: default_queue_name(),
            job_timeout_seconds: default_job_timeout(),
            max_tries: default_max_tries(),
            keep_result_seconds: default_keep_result(),
            retry_delay_seconds: default_retry_delay(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_poll_interval() -> u64 {
    500
}

fn default_queue_name() -> String {
    "prodkit:queue".to_string()
}

fn default_job_timeout() -> u64 {
    300
}

fn default_max_tries() -> u32 {
    5
}

fn default_keep_result() -> u64 {
    3600
}

fn default_retry_delay() -> u64 {
    5
}

fn default_shutdown_grace() -> u64 {
    30
}
