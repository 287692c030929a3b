// src/handlers/webhooks.rs
use axum::{body::Bytes, http::HeaderMap, response::Json, routing::post, Extension, Router};
use serde_json::json;
use std::sync::Arc;

use crate::config::WEBHOOK_PATH;
use crate::error::GenerationError;
use crate::jobs::CALLBACK_SECRET_HEADER;
use crate::state::AppState;

pub fn webhook_routes() -> Router {
    Router::new().route(WEBHOOK_PATH, post(video_generation_callback))
}

/// Render worker callback. The secret is checked before the body is parsed.
async fn video_generation_callback(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let provided = headers
        .get(CALLBACK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    state.reconciler.reconcile(provided, &body).await?;
    Ok(Json(json!({ "success": true })))
}
