//! Request logging middleware.
//!
//! Logs every request with method, path, status code, and latency. Health
//! probes are skipped to keep the log readable.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;

    if status >= 500 {
        warn!(%method, path, status, latency_ms, "request failed");
    } else {
        info!(%method, path, status, latency_ms, "request completed");
    }

    response
}
