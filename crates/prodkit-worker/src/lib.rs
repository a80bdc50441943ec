//! Deferred job dispatch and background job processing for ProdKit.
//!
//! This crate provides:
//! - [`EnqueueJob`] / [`enqueue_job`], which buffer job requests for the
//!   current unit of work instead of talking to the queue
//! - [`DeferredJobBuffer::flush`], which hands buffered requests to a
//!   [`JobTransport`] in order once the unit of work has succeeded
//! - Redis and in-memory queue transports
//! - A job registry, per-job lifecycle hooks, a polling worker runner and a
//!   cron scheduler

pub mod buffer;
pub mod executor;
pub mod jobs;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod resources;
pub mod runner;
pub mod scheduler;
pub mod transport;

pub use buffer::{DeferredJobBuffer, EnqueueJob, PartialDispatch, enqueue_job, flush_enqueued_jobs};
pub use executor::{JobDisposition, JobExecutionError, JobExecutor};
pub use lifecycle::{
    JobContext, JobPhase, WorkerContext, on_job_end, on_job_start, on_shutdown, on_startup,
    run_job,
};
pub use registry::{
    CronField, CronSchedule, JobArguments, JobHandler, JobOptions, JobRegistry,
    JobRegistryBuilder, RegisteredJob, Weekday, handler_fn,
};
pub use resources::ResourceStack;
pub use request::{JobHandle, JobRequest, Kwargs};
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
pub use transport::memory::MemoryQueue;
pub use transport::redis::RedisQueue;
pub use transport::{JobOutcome, JobSource, JobTransport, QueuedJob, ResultRetention};
