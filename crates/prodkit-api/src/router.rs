//! Route definitions for the ProdKit HTTP API.

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the router with every route and the unit-of-work middleware.
pub fn build_router(state: AppState) -> Router {
    unit_of_work(
        Router::new().merge(health_routes()).merge(tenant_routes()),
        state,
    )
}

/// Wrap `routes` so every request runs as one unit of work.
///
/// Layers added later wrap the earlier ones, so the request passes the
/// correlation middleware first and the flush middleware last.
pub fn unit_of_work(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::flush::flush_enqueued_jobs,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::tenant::tenant_context,
        ))
        .layer(axum_middleware::from_fn(
            middleware::correlation::log_correlation_id,
        ))
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

fn tenant_routes() -> Router<AppState> {
    Router::new().route(
        "/v1/tenants/provision",
        post(handlers::tenant::provision_schema),
    )
}
