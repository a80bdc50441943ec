//! # prodkit-database
//!
//! Storage plumbing for ProdKit: mapping tenants to PostgreSQL schemas,
//! creating schema-scoped connection pools ("engines"), and running work
//! inside a committed-or-rolled-back transaction.

pub mod engine;
pub mod provision;
pub mod schema;
pub mod session;

pub use engine::{DatabaseEngine, EngineFactory, PgEngineFactory, ProcessName};
pub use schema::{SchemaName, SchemaResolver, resolve_schema};
pub use session::SessionMaker;
