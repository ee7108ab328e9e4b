//! HTTP route handlers: health and activation queries.

use std::sync::Arc;

use actlog_query::{Identity, ListParams, QueryError, QueryOutput};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use super::json_error;
use super::route::{self, ActivationRoute};
use super::state::AppState;

/// A query failure rendered as `{"error": ...}` with its status.
pub(crate) struct ApiError(pub(crate) QueryError);

pub(crate) fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        QueryError::Forbidden => StatusCode::FORBIDDEN,
        QueryError::NotFound(_) => StatusCode::NOT_FOUND,
        QueryError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        QueryError::CorruptedRecord | QueryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(status_for(&self.0), &self.0.to_string()).into_response()
    }
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// Any method on `/{*path}`.
///
/// Only GET and HEAD reach the engine; other methods on an activation path
/// are refused before their parameters are looked at.
pub(crate) async fn handle_activations(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Path(path): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let Some(route) = route::parse(&path) else {
        return json_error(StatusCode::NOT_FOUND, "not found").into_response();
    };
    if method != Method::GET && method != Method::HEAD {
        return ApiError(QueryError::MethodNotAllowed).into_response();
    }

    let result = match route {
        ActivationRoute::List { namespace } => {
            let params = match params {
                Ok(Query(params)) => params,
                Err(rejection) => {
                    return json_error(StatusCode::BAD_REQUEST, &rejection.body_text())
                        .into_response()
                }
            };
            state.queries.list(&identity, &namespace, &params).await
        }
        ActivationRoute::Get {
            namespace,
            activation_id,
            sub_resource,
        } => {
            state
                .queries
                .get(&identity, &namespace, &activation_id, sub_resource.as_deref())
                .await
        }
    };

    match result {
        Ok(output) => respond(output),
        Err(err) => {
            tracing::debug!(%path, error = %err, "activation request failed");
            ApiError(err).into_response()
        }
    }
}

fn respond(output: QueryOutput) -> Response {
    (StatusCode::OK, Json(output.into_json())).into_response()
}
