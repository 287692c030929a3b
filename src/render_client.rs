// HTTP client for the rendering worker service
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::providers::{
    MuxRequest, MuxResponse, ProviderError, RenderBackend, RenderJobAccepted, RenderJobRequest,
};

const PROVIDER: &str = "render worker";

#[derive(Debug, Clone)]
pub struct RenderWorkerClient {
    client: Client,
    base_url: String,
}

impl RenderWorkerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let response = ensure_success(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::new(PROVIDER, None, format!("unreadable response from {}: {}", path, e)))
    }
}

/// Non-2xx responses carry `{detail}`; fall back to the raw body
async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::new(PROVIDER, Some(status.as_u16()), error_detail(&body)))
}

pub fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|value| match value.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    });
    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.to_string(),
    }
}

#[async_trait]
impl RenderBackend for RenderWorkerClient {
    async fn submit_render_job(&self, request: &RenderJobRequest) -> Result<RenderJobAccepted, ProviderError> {
        self.post_json("/render-and-upload-async", request).await
    }

    async fn mux_audio_video(&self, request: &MuxRequest) -> Result<MuxResponse, ProviderError> {
        self.post_json("/mux-audio-video", request).await
    }
}
