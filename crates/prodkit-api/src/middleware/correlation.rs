//! Request correlation and logging middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, info};

use prodkit_context::{CORRELATION_ID, LogContext, ScopedContext, generate_correlation_id};

/// Binds a fresh `correlation_id` plus `method` and `path` for the request,
/// and logs method, path, status and duration once it completes.
pub async fn log_correlation_id(request: Request, next: Next) -> Response {
    let correlation_id = generate_correlation_id();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let log = LogContext::current().bind([
        (CORRELATION_ID, correlation_id.clone()),
        ("method", method.clone()),
        ("path", path.clone()),
    ]);
    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();
    let response = log.scope(next.run(request)).instrument(span.clone()).await;

    span.in_scope(|| {
        info!(
            status = %response.status().as_u16(),
            duration_ms = %start.elapsed().as_millis(),
            "HTTP request"
        );
    });

    response
}
