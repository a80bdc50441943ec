//! Carry every ambient context into a spawned task.
//!
//! Task-local values do not follow `tokio::spawn`. Capture a snapshot on the
//! parent task and scope it around the child future to re-establish them.

use std::future::Future;

use crate::domain::{AccountContext, OrganizationContext, TenantContext, UserContext};
use crate::execution::ExecutionContext;
use crate::log::LogContext;
use crate::scope::ScopedContext;

/// Copy of all ambient contexts at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientSnapshot {
    /// Tenant at capture time.
    pub tenant: TenantContext,
    /// Account at capture time.
    pub account: AccountContext,
    /// Organization at capture time.
    pub organization: OrganizationContext,
    /// User at capture time.
    pub user: UserContext,
    /// Execution context at capture time.
    pub execution: ExecutionContext,
    /// Bound log fields at capture time.
    pub log: LogContext,
}

impl AmbientSnapshot {
    /// Capture the current values.
    pub fn capture() -> Self {
        Self {
            tenant: TenantContext::current(),
            account: AccountContext::current(),
            organization: OrganizationContext::current(),
            user: UserContext::current(),
            execution: ExecutionContext::current(),
            log: LogContext::current(),
        }
    }

    /// Run `future` with every captured value in scope.
    pub fn scope<F>(self, future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let Self {
            tenant,
            account,
            organization,
            user,
            execution,
            log,
        } = self;

        tenant.scope(account.scope(organization.scope(user.scope(
            execution.scope(log.scope(future)),
        ))))
    }
}
