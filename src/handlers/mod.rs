// src/handlers/mod.rs
pub mod generate;
pub mod prompts;
pub mod status;
pub mod videos;
pub mod webhooks;

use axum::{body::Bytes, Extension, Router};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::GenerationError;
use crate::middleware;
use crate::state::AppState;

/// Full HTTP surface with the shared state installed
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(generate::generate_routes())
        .merge(prompts::prompt_routes())
        .merge(webhooks::webhook_routes())
        .merge(videos::video_routes())
        .merge(status::status_routes())
        .layer(axum::middleware::from_fn(middleware::logging::request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

/// Strict JSON body: malformed input is a 400
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, GenerationError> {
    serde_json::from_slice(body).map_err(|e| GenerationError::Validation(format!("Invalid JSON body: {}", e)))
}

/// Optional override body: missing or malformed input means "no overrides"
pub(crate) fn parse_overrides<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable override body: {}", e);
        T::default()
    })
}
