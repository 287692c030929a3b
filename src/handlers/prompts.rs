// src/handlers/prompts.rs
//! Step-level re-runs for an existing prompt. Override bodies are optional
//! and an unreadable body is treated as "no overrides".
use axum::{
    body::Bytes,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Extension, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::parse_overrides;
use crate::error::GenerationError;
use crate::jobs::RenderQuality;
use crate::middleware::identity::RequireIdentity;
use crate::services::MuxOverrides;
use crate::state::AppState;
use crate::utils::non_blank;

pub fn prompt_routes() -> Router {
    Router::new()
        .route("/prompts/claim-legacy", post(claim_legacy))
        .route("/prompts/:prompt_id/script", post(rerun_script))
        .route("/prompts/:prompt_id/audio", post(rerun_audio))
        .route("/prompts/:prompt_id/video", post(rerun_video))
        .route("/prompts/:prompt_id/mux", post(rerun_mux))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioOverrides {
    narration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoOverrides {
    manim_script: Option<String>,
    quality: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MuxBody {
    audio_url: Option<String>,
    video_url: Option<String>,
    output_name: Option<String>,
    bucket_name: Option<String>,
}

async fn rerun_script(
    Extension(state): Extension<Arc<AppState>>,
    Path(prompt_id): Path<String>,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let prompt = state.workflow.intake().require_prompt(&prompt_id).await?;
    let generated = state.workflow.scripts().generate_script_for_prompt(&prompt).await?;

    Ok(Json(json!({
        "success": true,
        "promptId": prompt.prompt_id,
        "scriptId": generated.record.script_id,
        "result": generated.output,
    })))
}

async fn rerun_audio(
    Extension(state): Extension<Arc<AppState>>,
    Path(prompt_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let overrides: AudioOverrides = parse_overrides(&body);
    let prompt = state.workflow.intake().require_prompt(&prompt_id).await?;
    let narration = non_blank(overrides.narration);

    let audio = state
        .workflow
        .audio()
        .generate_audio_for_prompt(&prompt, narration.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "promptId": prompt.prompt_id,
        "audioId": audio.record.id,
        "audioUrl": audio.audio_url,
        "usedTestAudio": audio.used_test_audio,
    })))
}

async fn rerun_video(
    Extension(state): Extension<Arc<AppState>>,
    Path(prompt_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, GenerationError> {
    let overrides: VideoOverrides = parse_overrides(&body);
    let prompt = state.workflow.intake().require_prompt(&prompt_id).await?;

    let script = state
        .store
        .latest_script(prompt.id)
        .await?
        .ok_or_else(|| GenerationError::MissingArtifact("Script not found for prompt".to_string()))?;
    let audio = state
        .store
        .latest_audio(prompt.id)
        .await?
        .ok_or_else(|| GenerationError::MissingArtifact("Audio not found for prompt".to_string()))?;

    let manim_script = non_blank(overrides.manim_script);
    let quality = RenderQuality::from_option(overrides.quality.as_deref());
    let job = state
        .workflow
        .dispatcher()
        .enqueue_video_processing_job(&prompt, &script, &audio.audio_url, quality, manim_script.as_deref())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "promptId": prompt.prompt_id,
            "videoRecordId": job.video_record_id,
            "muxRecordId": job.mux_record_id,
            "jobId": job.job_id,
            "jobStatus": job.status,
        })),
    ))
}

async fn rerun_mux(
    Extension(state): Extension<Arc<AppState>>,
    Path(prompt_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let body: MuxBody = parse_overrides(&body);
    let prompt = state.workflow.intake().require_prompt(&prompt_id).await?;

    let outcome = state
        .mux
        .mux_for_prompt(
            &prompt,
            MuxOverrides {
                audio_url: body.audio_url,
                video_url: body.video_url,
                output_name: body.output_name,
                bucket_name: body.bucket_name,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "promptId": prompt.prompt_id,
        "muxRecordId": outcome.record.id,
        "videoRecordId": outcome.record.video_id,
        "finalVideoUrl": outcome.final_video_url,
        "status": outcome.record.status,
        "message": outcome.message,
    })))
}

/// Adopt every ownerless prompt for the caller
async fn claim_legacy(
    Extension(state): Extension<Arc<AppState>>,
    RequireIdentity(subject): RequireIdentity,
) -> Result<Json<serde_json::Value>, GenerationError> {
    let count = state.store.claim_legacy_prompts(&subject).await?;
    tracing::info!(subject_id = %subject, count, "claimed legacy prompts");

    Ok(Json(json!({
        "success": true,
        "count": count,
    })))
}
