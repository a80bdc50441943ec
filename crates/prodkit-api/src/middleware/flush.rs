//! Deferred job flush middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use prodkit_core::error::AppError;
use prodkit_worker::DeferredJobBuffer;

use crate::error::ApiError;
use crate::state::AppState;

/// Owns the request's deferred job buffer.
///
/// Jobs enqueued while handling the request are handed to the transport
/// after the handler has returned, and only if the response status is below
/// 400. If the transport fails part-way the response is replaced with a 500.
pub async fn flush_enqueued_jobs(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let buffer = DeferredJobBuffer::new(&state.config.worker.default_queue_name);
    let response = buffer.scope(next.run(request)).await;

    if response.status().is_client_error() || response.status().is_server_error() {
        buffer.discard();
        return response;
    }

    match buffer.flush(state.transport.as_ref()).await {
        Ok(_) => response,
        Err(partial) => ApiError(AppError::from(partial)).into_response(),
    }
}
