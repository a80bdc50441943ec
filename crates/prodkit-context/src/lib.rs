//! # prodkit-context
//!
//! Ambient, task-scoped context for ProdKit units of work.
//!
//! Each context type is stored in its own `tokio::task_local!` slot. A value
//! is made visible with [`ScopedContext::scope`] (async) or
//! [`ScopedContext::sync_scope`] (sync) and is visible to everything the
//! wrapped block calls, on that task only. The previous value comes back
//! when the block finishes, whether it returns, fails, panics or is
//! dropped.

#[macro_use]
mod scope;

pub mod domain;
pub mod execution;
pub mod log;
pub mod snapshot;

pub use domain::{AccountContext, OrganizationContext, TenantContext, UserContext};
pub use execution::{ExecutionContext, WorkerExecutionPayload};
pub use log::{CORRELATION_ID, LogContext, generate_correlation_id};
pub use scope::ScopedContext;
pub use snapshot::AmbientSnapshot;
