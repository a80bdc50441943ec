//! Tenant provisioning.

use async_trait::async_trait;
use serde_json::{Value, json};

use prodkit_database::provision::create_tenant_schema;

use crate::executor::JobExecutionError;
use crate::lifecycle::JobContext;
use crate::registry::{JobArguments, JobHandler};

/// Name the schema provisioning job is registered under.
pub const PROVISION_SCHEMA_JOB: &str = "tenant.provision_schema";

/// Creates the schema of the tenant the job was enqueued for.
///
/// Enqueued without a tenant it ensures the special schema instead.
/// Creating an existing schema is a no-op, so retries are safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionSchemaHandler;

#[async_trait]
impl JobHandler for ProvisionSchemaHandler {
    async fn run(&self, ctx: JobContext, args: JobArguments) -> Result<Value, JobExecutionError> {
        let schema = create_tenant_schema(
            ctx.engine(),
            ctx.worker().resolver(),
            args.tenant_id.as_deref(),
        )
        .await
        .map_err(|e| JobExecutionError::Transient(e.to_string()))?;

        tracing::info!(schema = %schema, tenant_id = ?args.tenant_id, "Tenant schema provisioned");
        Ok(json!({ "schema": schema.as_str() }))
    }
}
