// providers.rs - Boundaries to the external services the pipeline drives
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::retry::StatusCoded;

/// Failure reported by an external provider. `status` is the HTTP status when
/// a response was obtained, `None` for transport failures.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider} request failed{}: {message}", status_suffix(.status))]
pub struct ProviderError {
    pub provider: &'static str,
    pub status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({})", code)).unwrap_or_default()
}

impl ProviderError {
    pub fn new(provider: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            provider,
            status,
            message: message.into(),
        }
    }

    pub fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        Self::new(provider, err.status().map(|s| s.as_u16()), err.to_string())
    }
}

impl StatusCoded for ProviderError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }
}

/// One structured-output request to the language model
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub response_schema: Option<Value>,
}

impl ModelRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            prompt: prompt.into(),
            response_schema: None,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Raw text of the first candidate; `None` when the model returned nothing
    async fn generate(&self, request: &ModelRequest) -> Result<Option<String>, ProviderError>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProviderError>;

    fn public_url(&self, bucket: &str, object_name: &str) -> String;
}

/// Payload of `POST {backend}/render-and-upload-async`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderJobRequest {
    pub script_code: String,
    pub scene_name: String,
    pub quality: String,
    pub prompt_id: String,
    pub script_id: String,
    pub video_record_id: String,
    pub mux_record_id: String,
    pub audio_url: String,
    pub output_name: String,
    pub bucket_name: String,
    pub audio_speed: f64,
    pub language: String,
    pub callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderJobAccepted {
    #[serde(default, alias = "jobId")]
    pub job_id: Option<String>,
}

/// Payload of `POST {backend}/mux-audio-video`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MuxRequest {
    pub video_url: String,
    pub audio_url: String,
    pub output_name: String,
    pub bucket_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MuxResponse {
    #[serde(default)]
    pub combined_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl MuxResponse {
    pub fn output_url(&self) -> Option<&str> {
        usable(&self.combined_url).or_else(|| usable(&self.video_url))
    }
}

fn usable(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|u| !u.trim().is_empty())
}

#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn submit_render_job(&self, request: &RenderJobRequest) -> Result<RenderJobAccepted, ProviderError>;

    async fn mux_audio_video(&self, request: &MuxRequest) -> Result<MuxResponse, ProviderError>;
}
