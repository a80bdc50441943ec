//! Redis queue transport configuration.

use serde::{Deserialize, Serialize};

/// Redis connection settings for the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Key prefix for job, retry and result keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Lifetime of a queued job payload in seconds.
    #[serde(default = "default_job_expiry")]
    pub job_expiry_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: default_key_prefix(),
            job_expiry_seconds: default_job_expiry(),
        }
    }
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "prodkit:".to_string()
}

fn default_job_expiry() -> u64 {
    86_400
}
