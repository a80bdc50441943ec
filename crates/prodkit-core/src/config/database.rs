//! Database configuration.

use serde::{Deserialize, Serialize};

/// Database connection pool and schema layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Maximum connection lifetime in seconds before it is recycled.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_seconds: u64,
    /// Schema used when no tenant is active.
    #[serde(default = "default_special_schema")]
    pub special_schema: String,
    /// Prefix for per-tenant schemas.
    #[serde(default = "default_tenant_schema_prefix")]
    pub tenant_schema_prefix: String,
}

impl DatabaseConfig {
    /// Configuration for `url` with every other field at its default.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            max_lifetime_seconds: default_max_lifetime(),
            special_schema: default_special_schema(),
            tenant_schema_prefix: default_tenant_schema_prefix(),
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    0
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_max_lifetime() -> u64 {
    600
}

fn default_special_schema() -> String {
    "public".to_string()
}

fn default_tenant_schema_prefix() -> String {
    "tenant_".to_string()
}
