//! Cron scheduler for periodic jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use prodkit_context::{ExecutionContext, ScopedContext, TenantContext};
use prodkit_core::error::AppError;
use prodkit_core::result::AppResult;

use crate::registry::JobRegistry;
use crate::request::{JobRequest, Kwargs};
use crate::transport::JobTransport;

/// Enqueues registered periodic jobs when their schedule fires.
///
/// A tick's job id is `cron:{name}:{unix seconds}`, so several worker
/// processes sharing a queue enqueue each tick only once. Periodic jobs
/// never run at startup; the first run is the first scheduled tick.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Transport ticks are enqueued on
    transport: Arc<dyn JobTransport>,
    /// Queue ticks are enqueued on
    queue_name: String,
    /// Tenant ambient when the scheduler was created
    tenant: TenantContext,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("queue_name", &self.queue_name)
            .field("tenant", &self.tenant)
            .finish()
    }
}

impl CronScheduler {
    /// Create a scheduler enqueueing on `queue_name`.
    ///
    /// Ticks carry the tenant that is ambient at this call.
    pub async fn new(
        transport: Arc<dyn JobTransport>,
        queue_name: impl Into<String>,
    ) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            transport,
            queue_name: queue_name.into(),
            tenant: TenantContext::current(),
        })
    }

    /// Schedule every periodic job in `registry`. Returns how many were added.
    pub async fn register(&self, registry: &JobRegistry) -> AppResult<usize> {
        let mut added = 0;
        for registered in registry.cron_jobs() {
            let Some(schedule) = &registered.schedule else {
                continue;
            };
            let expression = schedule.to_cron_expression();
            let name = registered.name.clone();
            let transport = Arc::clone(&self.transport);
            let queue_name = self.queue_name.clone();
            let tenant = self.tenant.clone();

            let job = CronJob::new_async(expression.as_str(), move |_uuid, _lock| {
                let request = tick_request(&name, &queue_name, &tenant, Utc::now());
                let transport = Arc::clone(&transport);
                Box::pin(async move {
                    tracing::debug!("Scheduling periodic job {}", request.job_id);
                    match transport.enqueue(&request).await {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            tracing::debug!("Tick {} already enqueued elsewhere", request.job_id);
                        }
                        Err(e) => {
                            tracing::error!("Failed to enqueue {}: {}", request.name, e);
                        }
                    }
                })
            })
            .map_err(|e| {
                AppError::internal(format!(
                    "Failed to create schedule for '{}': {}",
                    registered.name, e
                ))
            })?;

            self.scheduler.add(job).await.map_err(|e| {
                AppError::internal(format!(
                    "Failed to add schedule for '{}': {}",
                    registered.name, e
                ))
            })?;

            tracing::info!("Registered periodic job: {} ({})", registered.name, expression);
            added += 1;
        }
        Ok(added)
    }

    /// Start the scheduler
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}

/// The request enqueued for one tick of periodic job `name`.
pub(crate) fn tick_request(
    name: &str,
    queue_name: &str,
    tenant: &TenantContext,
    tick: DateTime<Utc>,
) -> JobRequest {
    JobRequest::with_context(
        name,
        Vec::new(),
        Kwargs::new(),
        format!("cron:{name}:{}", tick.timestamp()),
        queue_name,
        &ExecutionContext::with_tenant(false, tenant.clone()),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CronSchedule, JobOptions, handler_fn};
    use crate::transport::memory::MemoryQueue;
    use chrono::TimeZone;
    use serde_json::Value;

    #[test]
    fn test_tick_request_id_is_stable_within_a_second() {
        let tenant = TenantContext::for_tenant("t1");
        let tick = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        let a = tick_request("nightly", "q", &tenant, tick);
        let b = tick_request(
            "nightly",
            "q",
            &tenant,
            tick + chrono::Duration::milliseconds(400),
        );

        assert_eq!(a.job_id, "cron:nightly:1704078000");
        assert_eq!(a.job_id, b.job_id);
        assert_eq!(a.tenant_id(), Some("t1"));
        assert_eq!(a.request_correlation_id(), None);
    }

    #[tokio::test]
    async fn test_register_counts_periodic_jobs_only() {
        let registry = JobRegistry::builder()
            .job("adhoc", handler_fn(|_, _| async { Ok(Value::Null) }), JobOptions::new())
            .cron(
                "nightly",
                handler_fn(|_, _| async { Ok(Value::Null) }),
                CronSchedule::new().hour(2).minute(0),
            )
            .build()
            .unwrap();

        let scheduler = CronScheduler::new(Arc::new(MemoryQueue::new()), "q")
            .await
            .unwrap();
        assert_eq!(scheduler.register(&registry).await.unwrap(), 1);
    }
}
