//! Built-in job handlers.

pub mod tenant;

pub use tenant::{PROVISION_SCHEMA_JOB, ProvisionSchemaHandler};

use crate::registry::{JobOptions, JobRegistryBuilder};

/// Register every built-in job on `builder`.
pub fn register_builtin(builder: JobRegistryBuilder) -> JobRegistryBuilder {
    builder.job(
        PROVISION_SCHEMA_JOB,
        ProvisionSchemaHandler,
        JobOptions::new().max_tries(3),
    )
}
