//! # prodkit-api
//!
//! HTTP layer for ProdKit built on Axum.
//!
//! Every request is a unit of work: the middleware stack binds a fresh
//! correlation id, resolves and scopes the tenant, and owns the request's
//! deferred job buffer, which is flushed only after a successful response.

pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use error::ApiError;
pub use state::AppState;
