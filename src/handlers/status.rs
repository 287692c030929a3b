// src/handlers/status.rs
use axum::{response::Json, routing::get, Extension, Router};
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

fn configured(flag: bool) -> &'static str {
    if flag {
        "configured"
    } else {
        "not_configured"
    }
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let database = if state.store.backend_name() == "in_memory" {
        "in_memory"
    } else {
        match state.store.ping().await {
            Ok(()) => "healthy",
            Err(e) => {
                tracing::error!("Database health check failed: {}", e);
                "unhealthy"
            }
        }
    };

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": database,
            "language_model": state.language_model_name,
            "speech": configured(state.speech_configured),
            "storage": configured(state.storage_configured),
        },
        "synthesisEnabled": state.synthesis_enabled,
    }))
}
