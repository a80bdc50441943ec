//! Deferred job buffering.
//!
//! Code running inside a unit of work (an HTTP request, a job) never talks
//! to the queue directly. [`enqueue_job`] and [`EnqueueJob::enqueue`] append
//! a fully-resolved [`JobRequest`] to the unit's [`DeferredJobBuffer`], and
//! whoever owns the unit flushes the buffer once the work has succeeded and
//! committed. A failed unit simply drops its buffer, so no job ever refers
//! to state that was rolled back.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::task::futures::TaskLocalFuture;
use tracing::{debug, error, warn};

use prodkit_context::{ExecutionContext, LogContext, ScopedContext};
use prodkit_core::error::{AppError, ErrorKind};
use prodkit_core::result::AppResult;

use crate::request::{JobRequest, Kwargs, RESERVED_KEYS};
use crate::transport::JobTransport;

tokio::task_local! {
    static JOB_BUFFER: DeferredJobBuffer;
}

/// Ordered list of job requests waiting for their unit of work to finish.
///
/// Clones share the same list, so the middleware or job wrapper that owns
/// the unit can keep a handle while the buffer is scoped around the work.
#[derive(Debug, Clone)]
pub struct DeferredJobBuffer {
    inner: Arc<BufferInner>,
}

#[derive(Debug)]
struct BufferInner {
    default_queue: String,
    jobs: Mutex<Vec<JobRequest>>,
}

impl DeferredJobBuffer {
    /// Create an empty buffer whose jobs default to `default_queue`.
    pub fn new(default_queue: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                default_queue: default_queue.into(),
                jobs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The buffer scoped around the current unit of work.
    pub fn current() -> Option<Self> {
        JOB_BUFFER.try_with(Clone::clone).ok()
    }

    /// Run `future` with this buffer as the current one.
    pub fn scope<F>(&self, future: F) -> TaskLocalFuture<Self, F>
    where
        F: Future,
    {
        JOB_BUFFER.scope(self.clone(), future)
    }

    /// Queue used when a request does not name one.
    pub fn default_queue(&self) -> &str {
        &self.inner.default_queue
    }

    /// Append a request.
    pub fn push(&self, request: JobRequest) {
        self.jobs().push(request);
    }

    /// Number of buffered requests.
    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Copy of the buffered requests, in enqueue order.
    pub fn pending(&self) -> Vec<JobRequest> {
        self.jobs().clone()
    }

    /// Drop every buffered request, returning how many there were.
    pub fn discard(&self) -> usize {
        let dropped = std::mem::take(&mut *self.jobs());
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Discarding buffered jobs of a failed unit of work");
        }
        dropped.len()
    }

    /// Hand every buffered request to `transport`, in order.
    ///
    /// The buffer is emptied before the first transport call, so a second
    /// flush, or a job enqueued while this flush is running, never causes a
    /// request to be sent twice. Requests the transport reports as
    /// duplicates count as dispatched. On the first transport error the
    /// remaining requests are logged and dropped, and [`PartialDispatch`]
    /// describes how far the flush got.
    pub async fn flush(&self, transport: &dyn JobTransport) -> Result<usize, PartialDispatch> {
        let jobs = std::mem::take(&mut *self.jobs());
        let total = jobs.len();
        if total == 0 {
            return Ok(0);
        }

        debug!(count = total, "Flushing enqueued jobs");

        let mut pending = jobs.into_iter().enumerate();
        while let Some((index, request)) = pending.next() {
            match transport.enqueue(&request).await {
                Ok(Some(handle)) => {
                    debug!(
                        job_name = %request.name,
                        job_id = %handle.job_id,
                        queue = %handle.queue_name,
                        "Job enqueued"
                    );
                }
                Ok(None) => {
                    debug!(job_name = %request.name, job_id = %request.job_id, "Job already queued");
                }
                Err(source) => {
                    let tenant_id = request.tenant_id().map(str::to_owned);
                    error!(
                        job_name = %request.name,
                        job_id = %request.job_id,
                        tenant_id = ?tenant_id,
                        args = ?request.args,
                        kwargs = ?request.kwargs,
                        dispatched = index,
                        total,
                        error = %source,
                        "Partial dispatch: failed to enqueue job"
                    );
                    for (_, lost) in pending {
                        warn!(
                            job_name = %lost.name,
                            job_id = %lost.job_id,
                            tenant_id = ?lost.tenant_id(),
                            args = ?lost.args,
                            kwargs = ?lost.kwargs,
                            "Buffered job dropped after partial dispatch"
                        );
                    }
                    return Err(PartialDispatch {
                        dispatched: index,
                        total,
                        job_name: request.name,
                        job_id: request.job_id,
                        tenant_id,
                        source,
                    });
                }
            }
        }

        Ok(total)
    }

    fn jobs(&self) -> MutexGuard<'_, Vec<JobRequest>> {
        self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Flush the buffer scoped around the current unit of work, if any.
pub async fn flush_enqueued_jobs(transport: &dyn JobTransport) -> Result<usize, PartialDispatch> {
    match DeferredJobBuffer::current() {
        Some(buffer) => buffer.flush(transport).await,
        None => Ok(0),
    }
}

/// A flush stopped at a transport error.
///
/// The first `dispatched` requests were accepted; the failing request and
/// everything after it were logged and dropped.
#[derive(Debug, thiserror::Error)]
#[error(
    "partial dispatch: job '{job_name}' ({job_id}) could not be enqueued after {dispatched} of {total} jobs"
)]
pub struct PartialDispatch {
    /// Requests accepted before the failure.
    pub dispatched: usize,
    /// Requests the flush started with.
    pub total: usize,
    /// Name of the request that failed.
    pub job_name: String,
    /// Id of the request that failed.
    pub job_id: String,
    /// Tenant of the request that failed.
    pub tenant_id: Option<String>,
    /// Transport error.
    #[source]
    pub source: AppError,
}

impl PartialDispatch {
    /// Requests that never reached the transport, including the failing one.
    pub fn lost(&self) -> usize {
        self.total - self.dispatched
    }
}

impl From<PartialDispatch> for AppError {
    fn from(err: PartialDispatch) -> Self {
        AppError::with_source(ErrorKind::Dispatch, err.to_string(), err)
    }
}

/// Builder for a deferred job request.
///
/// ```ignore
/// let job_id = EnqueueJob::new("send_email")
///     .kwarg("to", "someone@example.com")
///     .enqueue()?;
/// ```
#[derive(Debug, Clone)]
pub struct EnqueueJob {
    name: String,
    args: Vec<Value>,
    kwargs: Kwargs,
    queue_name: Option<String>,
    job_id: Option<String>,
}

impl EnqueueJob {
    /// Start a request for the job registered as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            kwargs: Kwargs::new(),
            queue_name: None,
            job_id: None,
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append positional arguments.
    pub fn args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(values);
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Set several keyword arguments.
    pub fn kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs.extend(kwargs);
        self
    }

    /// Enqueue on `queue_name` instead of the buffer's default queue.
    pub fn queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    /// Use `job_id` instead of a generated one.
    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Resolve the request against the ambient contexts.
    ///
    /// Captures the current [`ExecutionContext`], its tenant, and the
    /// correlation id bound in [`LogContext`].
    pub fn build(self, default_queue: &str) -> AppResult<JobRequest> {
        if self.name.is_empty() {
            return Err(AppError::validation("Job name must not be empty"));
        }
        if let Some(key) = RESERVED_KEYS.iter().find(|k| self.kwargs.contains_key(**k)) {
            return Err(AppError::validation(format!(
                "Keyword argument '{key}' is reserved and set at enqueue time"
            )));
        }

        let execution = ExecutionContext::current();
        let log = LogContext::current();
        let job_id = self
            .job_id
            .unwrap_or_else(|| JobRequest::generate_job_id(&self.name));
        let queue_name = self
            .queue_name
            .unwrap_or_else(|| default_queue.to_string());

        Ok(JobRequest::with_context(
            self.name,
            self.args,
            self.kwargs,
            job_id,
            queue_name,
            &execution,
            log.correlation_id(),
        ))
    }

    /// Append the request to the current unit of work's buffer.
    ///
    /// Returns the job id. Fails if no buffer is in scope, so jobs can never
    /// bypass the deferred path.
    pub fn enqueue(self) -> AppResult<String> {
        let buffer = DeferredJobBuffer::current().ok_or_else(|| {
            AppError::context(format!(
                "Cannot enqueue job '{}': no deferred job buffer is in scope",
                self.name
            ))
        })?;

        let request = self.build(buffer.default_queue())?;
        let job_id = request.job_id.clone();
        debug!(
            job_name = %request.name,
            job_id = %job_id,
            tenant_id = ?request.tenant_id(),
            "Job buffered"
        );
        buffer.push(request);
        Ok(job_id)
    }
}

/// Buffer a job named `name` for the current unit of work.
pub fn enqueue_job(
    name: impl Into<String>,
    args: impl IntoIterator<Item = Value>,
    kwargs: Kwargs,
) -> AppResult<String> {
    EnqueueJob::new(name).args(args).kwargs(kwargs).enqueue()
}
