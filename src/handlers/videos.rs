// src/handlers/videos.rs
use axum::{extract::Path, response::Json, routing::get, Extension, Router};
use serde_json::json;
use std::sync::Arc;

use crate::error::GenerationError;
use crate::middleware::identity::RequireIdentity;
use crate::state::AppState;

pub fn video_routes() -> Router {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/:prompt_id", get(get_video))
}

/// Caller's prompts plus ownerless ones, newest first
async fn list_videos(
    Extension(state): Extension<Arc<AppState>>,
    RequireIdentity(subject): RequireIdentity,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let library = state.store.list_library(&subject).await?;

    let videos: Vec<serde_json::Value> = library
        .iter()
        .map(|summary| {
            json!({
                "id": summary.prompt.prompt_id,
                "title": summary.title(),
                "prompt": summary.prompt.prompt,
                "createdAt": summary.prompt.created_at,
                "videoUrl": summary.video_url(),
                "status": summary.status(),
            })
        })
        .collect();

    Ok(Json(json!(videos)))
}

async fn get_video(
    Extension(state): Extension<Arc<AppState>>,
    RequireIdentity(subject): RequireIdentity,
    Path(prompt_id): Path<String>,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let summary = state
        .store
        .prompt_summary(&prompt_id)
        .await?
        .ok_or_else(|| GenerationError::NotFound(format!("Prompt {} not found", prompt_id)))?;

    if !summary.prompt.is_visible_to(&subject) {
        tracing::warn!(prompt_id = %prompt_id, subject_id = %subject, "video access denied");
        return Err(GenerationError::Forbidden("Access denied".to_string()));
    }

    let script = summary.latest_script.as_ref();
    let error_message = summary.latest_mux.as_ref().and_then(|mux| mux.error_message.clone());

    Ok(Json(json!({
        "id": summary.prompt.prompt_id,
        "title": summary.title(),
        "prompt": summary.prompt.prompt,
        "explanation": script.map(|s| s.explanation.as_str()),
        "narration": script.map(|s| s.narration.as_str()),
        "videoUrl": summary.video_url(),
        "status": summary.status(),
        "errorMessage": error_message,
        "createdAt": summary.prompt.created_at,
    })))
}
