// src/jobs/dispatcher.rs
//! Hands a render job to the worker. The pair of records is created first so
//! both the caller and later callbacks have something to point at.

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::{JobStatus, LOCAL_JOB_PREFIX};
use crate::error::GenerationError;
use crate::models::generation::{Prompt, Script};
use crate::providers::{RenderBackend, RenderJobRequest};
use crate::retry::RetryPolicy;
use crate::store::GenerationStore;

/// Render every scene the worker detects
pub const AUTO_SCENE: &str = "auto";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl RenderQuality {
    /// Unknown or missing values fall back to the default tier
    pub fn from_option(raw: Option<&str>) -> Self {
        match raw.map(|q| q.trim().to_ascii_lowercase()).as_deref() {
            Some("medium") => RenderQuality::Medium,
            Some("high") => RenderQuality::High,
            _ => RenderQuality::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderQuality::Low => "low",
            RenderQuality::Medium => "medium",
            RenderQuality::High => "high",
        }
    }
}

impl fmt::Display for RenderQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub callback_url: String,
    pub callback_secret: Option<String>,
    pub bucket_name: String,
    pub audio_speed: f64,
}

#[derive(Debug, Clone)]
pub struct DispatchedJob {
    pub job_id: String,
    pub video_record_id: Uuid,
    pub mux_record_id: Uuid,
    pub status: JobStatus,
}

#[derive(Clone)]
pub struct RenderJobDispatcher {
    store: Arc<dyn GenerationStore>,
    render: Arc<dyn RenderBackend>,
    retry: RetryPolicy,
    settings: DispatchSettings,
}

impl RenderJobDispatcher {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        render: Arc<dyn RenderBackend>,
        retry: RetryPolicy,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            render,
            retry,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Create the QUEUED pair, submit the job and return without waiting for
    /// the render. A failed submission fails both records before returning.
    pub async fn enqueue_video_processing_job(
        &self,
        prompt: &Prompt,
        script: &Script,
        audio_url: &str,
        quality: RenderQuality,
        script_override: Option<&str>,
    ) -> Result<DispatchedJob, GenerationError> {
        let pair = self.store.create_job_pair(prompt.id).await?;
        let (video_id, mux_id) = (pair.video.id, pair.mux.id);

        let request = RenderJobRequest {
            script_code: script_override.unwrap_or(&script.script).to_string(),
            scene_name: AUTO_SCENE.to_string(),
            quality: quality.to_string(),
            prompt_id: prompt.prompt_id.clone(),
            script_id: script.script_id.clone(),
            video_record_id: video_id.to_string(),
            mux_record_id: mux_id.to_string(),
            audio_url: audio_url.to_string(),
            output_name: format!("final_{}", script.script_id),
            bucket_name: self.settings.bucket_name.clone(),
            audio_speed: self.settings.audio_speed,
            language: prompt.language.clone(),
            callback_url: self.settings.callback_url.clone(),
            callback_secret: self.settings.callback_secret.clone(),
        };

        let submitted = self
            .retry
            .run("render job submission", || self.render.submit_render_job(&request))
            .await;

        let accepted = match submitted {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::error!(
                    prompt_id = %prompt.prompt_id,
                    video_id = %video_id,
                    mux_id = %mux_id,
                    error = %err,
                    "render job submission failed"
                );
                if let Err(mark_err) = self.store.mark_job_failed(video_id, mux_id, &err.message).await {
                    tracing::error!(error = %mark_err, "could not record dispatch failure");
                }
                return Err(GenerationError::Dispatch(err.to_string()));
            }
        };

        let job_id = match accepted.job_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()) {
            Some(job_id) => job_id,
            None => {
                // Provisional: the first callback carrying a worker id replaces it
                let local = format!("{}{}", LOCAL_JOB_PREFIX, Uuid::new_v4());
                tracing::warn!(
                    prompt_id = %prompt.prompt_id,
                    job_id = %local,
                    "render worker returned no job id, using a local one"
                );
                local
            }
        };

        self.store.mark_job_processing(video_id, mux_id, &job_id).await?;

        tracing::info!(
            prompt_id = %prompt.prompt_id,
            job_id = %job_id,
            video_id = %video_id,
            mux_id = %mux_id,
            quality = %quality,
            "render job dispatched"
        );
        Ok(DispatchedJob {
            job_id,
            video_record_id: video_id,
            mux_record_id: mux_id,
            status: JobStatus::Processing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_parsing_is_lenient() {
        assert_eq!(RenderQuality::from_option(None), RenderQuality::Low);
        assert_eq!(RenderQuality::from_option(Some(" HIGH ")), RenderQuality::High);
        assert_eq!(RenderQuality::from_option(Some("Medium")), RenderQuality::Medium);
        assert_eq!(RenderQuality::from_option(Some("ultra")), RenderQuality::Low);
    }
}
