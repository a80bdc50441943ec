//! `prodkit provision`

use clap::Args;

use prodkit_core::config::AppConfig;
use prodkit_core::error::AppError;
use prodkit_database::provision::create_tenant_schema;
use prodkit_database::{EngineFactory, ProcessName, SchemaResolver};

/// Arguments for the provision command
#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Tenant whose schema is created; the special schema when omitted
    #[arg(short, long)]
    pub tenant: Option<String>,
}

/// Create the schema for a tenant and exit.
pub async fn execute(args: &ProvisionArgs, config: AppConfig) -> Result<(), AppError> {
    let resolver = SchemaResolver::from_config(&config.database);
    let engine = super::engine_factory(&config)
        .create_engine(ProcessName::Script, &resolver.resolve(None))
        .await?;

    let created = create_tenant_schema(&engine, &resolver, args.tenant.as_deref()).await;
    engine.dispose().await;

    let schema = created?;
    println!("Schema ready: {}", schema);
    Ok(())
}
