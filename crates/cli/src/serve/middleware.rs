//! HTTP middleware: rate limiting and API key authentication.

use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::state::AppState;

/// Rate limiting middleware. Checks per-IP request rate before routing.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ip = addr.ip();
    match state.rate_limiter.check(ip).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::debug!(%ip, retry_after, "rate limit exceeded");
            let body = serde_json::json!({
                "error": "rate limit exceeded",
                "retry_after": retry_after,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
    }
}

/// API key authentication middleware.
///
/// Every request except /health must carry either
/// `Authorization: Bearer <key>` or `X-API-Key: <key>`. The key's identity
/// is attached to the request for the handlers.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // /health is exempt from auth (for load balancer health checks)
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let headers = request.headers();
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "));
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    let Some(key) = bearer.or(api_key) else {
        return super::json_error(StatusCode::UNAUTHORIZED, "authentication required")
            .into_response();
    };
    let Some(identity) = state.credentials.get(key).cloned() else {
        return super::json_error(StatusCode::UNAUTHORIZED, "invalid API key").into_response();
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}
