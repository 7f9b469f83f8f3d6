use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use super::error::ApiError;
use super::state::ApiState;

/// Fixed-window rate limiting keyed by client IP and route. Requests
/// arriving without connection info (router-level tests) share one
/// local bucket.
pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "local".to_owned());
    let route = request.uri().path().to_owned();

    let (allowed, _remaining) = state.rate_limiter.allow(&client, &route);
    if !allowed {
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    next.run(request).await
}
