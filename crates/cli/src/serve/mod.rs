//! `actlog serve` -- HTTP JSON API over the activation query engine.
//!
//! Records are loaded from JSON-lines files into an in-memory store whose
//! views are refreshed in the background, so listings may briefly trail the
//! loaded data.
//!
//! Security features:
//! - API key authentication: each configured key maps to a subject and
//!   namespace, and every query is authorized against that identity
//! - CORS headers on all responses
//! - Per-IP rate limiting (default: 600 req/min, configurable)
//!
//! Endpoints:
//! - GET  /health                              - Server status (exempt from auth)
//! - GET  /{namespace}/activations             - List or count activations
//! - GET  /{namespace}/activations/{id}        - One activation
//! - GET  /{namespace}/activations/{id}/result - Its result
//! - GET  /{namespace}/activations/{id}/logs   - Its logs
//!
//! Namespaces may span several path segments. All responses use
//! Content-Type: application/json.

mod handlers;
mod middleware;
mod route;
mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actlog_query::ActivationQueries;
use actlog_storage::MemoryStore;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{handle_activations, handle_health, handle_not_found};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::config::ServerConfig;
use crate::loader::load_file;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over a prepared state.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/{*path}", any(handle_activations))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Load records, start the view refresher and serve until Ctrl+C.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(
    config: ServerConfig,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    for path in &config.records {
        let report = load_file(store.as_ref(), path).await?;
        tracing::info!(
            path = %path.display(),
            loaded = report.loaded,
            duplicates = report.duplicates,
            skipped = report.skipped.len(),
            "activation records loaded"
        );
    }
    store.refresh().await;
    let refresher = store.spawn_refresher(Duration::from_millis(config.refresh_interval_ms));

    let credentials: HashMap<_, _> = config.identities()?.into_iter().collect();
    if credentials.is_empty() {
        tracing::warn!("no credentials configured; every activation request will be rejected");
    }
    tracing::info!(
        rate_limit = config.rate_limit,
        credentials = credentials.len(),
        "server configured"
    );

    let state = Arc::new(AppState {
        queries: ActivationQueries::new(store, config.limits()),
        rate_limiter: RateLimiter::new(config.rate_limit),
        credentials,
    });
    let app = router(state);
    let addr = SocketAddr::new(config.bind, config.port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        tracing::info!(%addr, "actlog listening (https)");
        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
        });
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        refresher.abort();
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "actlog listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    refresher.abort();
    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
