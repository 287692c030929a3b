// src/handlers/generate.rs
use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Extension, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::parse_json;
use crate::error::GenerationError;
use crate::middleware::identity::Identity;
use crate::state::AppState;
use crate::workflow::GenerationRequest;

pub fn generate_routes() -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/prompts", post(create_prompt))
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl PromptRequest {
    fn prompt_text(&self) -> Result<&str, GenerationError> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GenerationError::Validation("Prompt is required".to_string()))
    }
}

/// Run the whole pipeline up to a queued render job
async fn generate(
    Extension(state): Extension<Arc<AppState>>,
    Identity(subject): Identity,
    body: Bytes,
) -> Result<impl IntoResponse, GenerationError> {
    let request: PromptRequest = parse_json(&body)?;
    let prompt = request.prompt_text()?.to_string();

    let outcome = state
        .workflow
        .run(GenerationRequest {
            prompt,
            language: request.language,
            subject_id: subject,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "promptId": outcome.prompt.prompt_id,
            "promptRecordId": outcome.prompt.id,
            "scriptId": outcome.script.record.script_id,
            "audioId": outcome.audio.record.id,
            "audioUrl": outcome.audio.audio_url,
            "usedTestAudio": outcome.audio.used_test_audio,
            "videoRecordId": outcome.job.video_record_id,
            "muxRecordId": outcome.job.mux_record_id,
            "jobId": outcome.job.job_id,
            "jobStatus": outcome.job.status,
            "result": outcome.script.output,
        })),
    ))
}

/// Create a prompt without generating anything
async fn create_prompt(
    Extension(state): Extension<Arc<AppState>>,
    Identity(subject): Identity,
    body: Bytes,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let request: PromptRequest = parse_json(&body)?;
    let prompt = state
        .workflow
        .intake()
        .create_prompt_for_user(request.prompt_text()?, request.language.as_deref(), subject.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "promptId": prompt.prompt_id,
        "promptRecordId": prompt.id,
        "prompt": prompt.prompt,
        "language": prompt.language,
        "userId": prompt.subject_id,
    })))
}
