//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use prodkit_core::config::AppConfig;
use prodkit_database::{DatabaseEngine, SchemaResolver, SessionMaker};
use prodkit_worker::JobTransport;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Transport deferred jobs are flushed to
    pub transport: Arc<dyn JobTransport>,
    /// Sessions on the application engine
    pub sessions: SessionMaker,
    /// Tenant to schema mapping
    pub resolver: SchemaResolver,
}

impl AppState {
    /// Assemble state from a config, a transport and the app engine.
    pub fn new(config: AppConfig, transport: Arc<dyn JobTransport>, engine: DatabaseEngine) -> Self {
        let resolver = SchemaResolver::from_config(&config.database);
        Self {
            config: Arc::new(config),
            transport,
            sessions: SessionMaker::new(engine),
            resolver,
        }
    }

    /// Prefix of the tenant headers, `x-{app}-`.
    pub fn header_prefix(&self) -> String {
        format!("x-{}-", self.config.app.slug())
    }
}
