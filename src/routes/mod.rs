pub mod auth;
pub mod blogs;
pub mod comments;

use axum::extract::{OriginalUri, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::response::ApiResponse;
use crate::state::AppState;

/// Every JSON endpoint, mounted under `/api` by the caller.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(blogs::router())
        .merge(comments::router())
        .method_not_allowed_fallback(method_not_allowed)
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "env": state.config.server.mode.as_str(),
        "time": crate::db::now_timestamp(),
    }))
}

/// GET /
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Inkwell blog API",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": {
            "auth": "/api/auth",
            "blogs": "/api/blogs",
            "health": "/api/health",
        },
    }))
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiResponse<()> {
    ApiResponse::error(StatusCode::NOT_FOUND, format!("Not found - {}", uri.path()))
}

/// Known path, unsupported method.
pub async fn method_not_allowed(
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {} not allowed on {}", method, uri.path()),
    )
}
