//! Job requests: what gets buffered during a unit of work and what a
//! transport ultimately enqueues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use prodkit_context::ExecutionContext;

/// Keyword arguments of a job.
pub type Kwargs = serde_json::Map<String, Value>;

/// Correlation id of the unit of work that enqueued the job.
pub const REQUEST_CORRELATION_ID_KEY: &str = "request_correlation_id";

/// Serialized [`prodkit_context::WorkerExecutionPayload`].
pub const EXECUTION_CONTEXT_KEY: &str = "prodkit_context";

/// Tenant the job runs for.
pub const TENANT_ID_KEY: &str = "tenant_id";

/// Caller-supplied job id.
pub const JOB_ID_KEY: &str = "_job_id";

/// Caller-supplied queue name.
pub const QUEUE_NAME_KEY: &str = "_queue_name";

/// Keys injected at enqueue time or interpreted by the transport. Callers
/// may not pass them as keyword arguments.
pub const RESERVED_KEYS: [&str; 5] = [
    REQUEST_CORRELATION_ID_KEY,
    EXECUTION_CONTEXT_KEY,
    TENANT_ID_KEY,
    JOB_ID_KEY,
    QUEUE_NAME_KEY,
];

/// A fully-resolved request to run a job.
///
/// `kwargs` already contains the injected `request_correlation_id`,
/// `prodkit_context` and `tenant_id` entries; a request is immutable once
/// it has been buffered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Registered job name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments, including the injected context entries.
    pub kwargs: Kwargs,
    /// Unique job id, also the queue's deduplication key.
    pub job_id: String,
    /// Queue the job is enqueued on.
    pub queue_name: String,
}

impl JobRequest {
    /// Build a request carrying `execution` and `request_correlation_id`.
    ///
    /// Entries in `kwargs` under the injected keys are overwritten.
    pub fn with_context(
        name: impl Into<String>,
        args: Vec<Value>,
        mut kwargs: Kwargs,
        job_id: impl Into<String>,
        queue_name: impl Into<String>,
        execution: &ExecutionContext,
        request_correlation_id: Option<&str>,
    ) -> Self {
        kwargs.insert(
            REQUEST_CORRELATION_ID_KEY.to_string(),
            request_correlation_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        kwargs.insert(
            EXECUTION_CONTEXT_KEY.to_string(),
            serde_json::json!({
                "is_during_installation": execution.worker_payload().is_during_installation,
            }),
        );
        kwargs.insert(
            TENANT_ID_KEY.to_string(),
            execution
                .tenant_id()
                .map_or(Value::Null, |id| Value::String(id.to_string())),
        );

        Self {
            name: name.into(),
            args,
            kwargs,
            job_id: job_id.into(),
            queue_name: queue_name.into(),
        }
    }

    /// Default job id for `name`: `"{name}:{32 hex chars}"`.
    pub fn generate_job_id(name: &str) -> String {
        format!("{name}:{}", Uuid::new_v4().simple())
    }

    /// Tenant the job was enqueued for.
    pub fn tenant_id(&self) -> Option<&str> {
        self.kwargs.get(TENANT_ID_KEY).and_then(Value::as_str)
    }

    /// Correlation id of the enqueuing unit of work.
    pub fn request_correlation_id(&self) -> Option<&str> {
        self.kwargs
            .get(REQUEST_CORRELATION_ID_KEY)
            .and_then(Value::as_str)
    }
}

/// Receipt for a job the transport accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Accepted job id.
    pub job_id: String,
    /// Queue the job landed on.
    pub queue_name: String,
    /// When the transport accepted it.
    pub enqueue_time: DateTime<Utc>,
}
