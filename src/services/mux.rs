// src/services/mux.rs
//! Synchronous audio/video muxing through the render worker.
use std::sync::Arc;
use uuid::Uuid;

use crate::error::GenerationError;
use crate::models::generation::{Mux, NewMux, Prompt};
use crate::providers::{MuxRequest, ProviderError, RenderBackend};
use crate::retry::RetryPolicy;
use crate::store::GenerationStore;
use crate::utils::non_blank;

#[derive(Debug, Clone, Default)]
pub struct MuxOverrides {
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub output_name: Option<String>,
    pub bucket_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MuxOutcome {
    pub record: Mux,
    pub final_video_url: String,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct MuxService {
    store: Arc<dyn GenerationStore>,
    render: Arc<dyn RenderBackend>,
    retry: RetryPolicy,
    default_bucket: String,
}

impl MuxService {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        render: Arc<dyn RenderBackend>,
        retry: RetryPolicy,
        default_bucket: String,
    ) -> Self {
        Self {
            store,
            render,
            retry,
            default_bucket,
        }
    }

    pub async fn mux_for_prompt(&self, prompt: &Prompt, overrides: MuxOverrides) -> Result<MuxOutcome, GenerationError> {
        let (video_url, source_video_id): (String, Option<Uuid>) = match non_blank(overrides.video_url) {
            Some(url) => (url, None),
            None => {
                let video = self
                    .store
                    .latest_completed_video(prompt.id)
                    .await?
                    .ok_or_else(|| GenerationError::MissingArtifact("No rendered video available for prompt".to_string()))?;
                let url = video.video_url.clone().ok_or_else(|| {
                    GenerationError::Internal(format!("completed video {} has no url", video.id))
                })?;
                (url, Some(video.id))
            }
        };

        let audio_url = match non_blank(overrides.audio_url) {
            Some(url) => url,
            None => {
                self.store
                    .latest_audio(prompt.id)
                    .await?
                    .ok_or_else(|| GenerationError::MissingArtifact("Audio not found for prompt".to_string()))?
                    .audio_url
            }
        };

        let output_name = match non_blank(overrides.output_name) {
            Some(name) => name,
            None => match self.store.latest_script(prompt.id).await? {
                Some(script) => format!("final_{}", script.script_id),
                None => format!("final_{}", prompt.prompt_id),
            },
        };

        let request = MuxRequest {
            video_url,
            audio_url,
            output_name,
            bucket_name: non_blank(overrides.bucket_name).unwrap_or_else(|| self.default_bucket.clone()),
        };

        let response = self
            .retry
            .run("audio/video mux", || self.render.mux_audio_video(&request))
            .await?;
        let final_video_url = response
            .output_url()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("render worker", None, "mux response carried no video url"))?;

        let record = self
            .store
            .create_completed_mux(NewMux {
                prompt_record_id: prompt.id,
                video_id: source_video_id,
                final_video_url: final_video_url.clone(),
            })
            .await?;

        tracing::info!(
            prompt_id = %prompt.prompt_id,
            mux_id = %record.id,
            output = %request.output_name,
            "mux completed"
        );
        Ok(MuxOutcome {
            record,
            final_video_url,
            message: response.message,
        })
    }
}
