//! Schema provisioning.

use tracing::info;

use prodkit_core::error::{AppError, ErrorKind};
use prodkit_core::result::AppResult;

use crate::engine::DatabaseEngine;
use crate::schema::{SchemaName, SchemaResolver};

/// Create `schema` if it does not exist yet.
pub async fn create_schema(engine: &DatabaseEngine, schema: &SchemaName) -> AppResult<()> {
    let statement = format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted());
    sqlx::query(&statement)
        .execute(engine.pool())
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to create schema '{schema}'"),
                e,
            )
        })?;

    info!(schema = %schema, "Schema ensured");
    Ok(())
}

/// Create the schema that `tenant_id` resolves to.
pub async fn create_tenant_schema(
    engine: &DatabaseEngine,
    resolver: &SchemaResolver,
    tenant_id: Option<&str>,
) -> AppResult<SchemaName> {
    let schema = resolver.resolve(tenant_id);
    create_schema(engine, &schema).await?;
    Ok(schema)
}
