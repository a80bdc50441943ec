//! Tenant administration handlers.

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

use prodkit_context::{ScopedContext, TenantContext};
use prodkit_core::error::AppError;
use prodkit_worker::EnqueueJob;
use prodkit_worker::jobs::PROVISION_SCHEMA_JOB;

use crate::error::ApiError;

/// POST /v1/tenants/provision
///
/// Queues schema creation for the request's tenant. The job reaches the
/// queue only once this request has succeeded.
pub async fn provision_schema() -> Result<(StatusCode, Json<Value>), ApiError> {
    let tenant = TenantContext::current();
    let Some(tenant_id) = tenant.tenant_id() else {
        return Err(AppError::validation("No tenant resolved for this request").into());
    };

    let job_id = EnqueueJob::new(PROVISION_SCHEMA_JOB).enqueue()?;
    tracing::info!(tenant_id = %tenant_id, job_id = %job_id, "Schema provisioning requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "tenant_id": tenant_id })),
    ))
}
