// Eleven Labs API Client
// Text-to-speech for narration tracks

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::ElevenLabsConfig;
use crate::providers::{ProviderError, SpeechSynthesizer};

const PROVIDER: &str = "elevenlabs";

#[derive(Clone)]
pub struct ElevenLabsClient {
    api_key: String,
    voice_id: String,
    model_id: String,
    output_format: String,
    client: Client,
    base_url: String,
}

#[derive(Serialize, Debug)]
pub struct TextToSpeechRequest<'a> {
    pub text: &'a str,
    pub model_id: &'a str,
}

impl ElevenLabsClient {
    pub fn new(config: &ElevenLabsConfig) -> Self {
        Self::with_base_url(config, "https://api.elevenlabs.io/v1".to_string())
    }

    pub fn with_base_url(config: &ElevenLabsConfig, base_url: String) -> Self {
        Self {
            api_key: config.api_key.clone(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice_id);

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .query(&[("output_format", self.output_format.as_str())])
            .json(&TextToSpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::new(PROVIDER, Some(status.as_u16()), error_text));
        }

        let audio_bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        tracing::debug!(bytes = audio_bytes.len(), voice_id = %self.voice_id, "speech synthesized");
        Ok(audio_bytes.to_vec())
    }
}
