//! Response stamping and request logging middleware.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};

use crate::state::MockState;

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "MockTgServer/1.0";

/// Add the `Server` header.
pub async fn server_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

/// Structured request logging, enabled by `verbose`.
///
/// Logs verb, path, peer, status, and duration. Injected errors are logged
/// at the same level as successes; they are expected traffic.
pub async fn request_logging_middleware(
    State(state): State<MockState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.verbose {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        path = %path,
        peer = %peer,
        status = %response.status().as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}
