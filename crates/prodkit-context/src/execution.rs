//! Execution context: the per-unit-of-work snapshot that travels with jobs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::TenantContext;
use crate::scope::ScopedContext;

/// Snapshot of the state a unit of work runs under.
///
/// The tenant is copied when the context is built, so later changes to the
/// ambient [`TenantContext`] do not alter an existing `ExecutionContext`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Set when the work was triggered by the app or repository installation
    /// flow, e.g. to suppress notifications for objects found during the
    /// initial sync.
    pub is_during_installation: bool,
    /// Tenant captured at construction.
    pub tenant_context: TenantContext,
}

impl ExecutionContext {
    /// Build a context capturing the ambient tenant.
    pub fn new(is_during_installation: bool) -> Self {
        Self::with_tenant(is_during_installation, TenantContext::current())
    }

    /// Build a context for an explicit tenant.
    pub fn with_tenant(is_during_installation: bool, tenant_context: TenantContext) -> Self {
        Self {
            is_during_installation,
            tenant_context,
        }
    }

    /// Tenant identifier captured by this context.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_context.tenant_id()
    }

    /// The part of this context that is shipped with an enqueued job.
    pub fn worker_payload(&self) -> WorkerExecutionPayload {
        WorkerExecutionPayload {
            is_during_installation: self.is_during_installation,
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<ExecutionContext is_during_installation={}, tenant_context={}>",
            self.is_during_installation, self.tenant_context
        )
    }
}

tokio::task_local! {
    static EXECUTION_CONTEXT: ExecutionContext;
}

impl ScopedContext for ExecutionContext {
    fn local_key() -> &'static tokio::task::LocalKey<Self> {
        &EXECUTION_CONTEXT
    }

    /// A clean context over whatever tenant is ambient right now.
    fn fallback() -> Self {
        Self::new(false)
    }
}

/// Serialized execution state carried in a job's keyword arguments.
///
/// The tenant travels separately as the job's `tenant_id` argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerExecutionPayload {
    /// Mirrors [`ExecutionContext::is_during_installation`].
    #[serde(default)]
    pub is_during_installation: bool,
}

impl WorkerExecutionPayload {
    /// Rebuild the execution context on the worker side.
    pub fn to_execution_context(self, tenant_context: TenantContext) -> ExecutionContext {
        ExecutionContext::with_tenant(self.is_during_installation, tenant_context)
    }
}
