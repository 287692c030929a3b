// src/services/audio_synthesis.rs
//! Narration audio: translate if needed, then produce audio with the
//! configured strategy and record it.
use std::sync::Arc;

use crate::audio::{normalize_audio, PcmFormat};
use crate::error::GenerationError;
use crate::models::generation::{Audio, NewAudio, Prompt};
use crate::providers::{ObjectStorage, ProviderError, SpeechSynthesizer};
use crate::retry::RetryPolicy;
use crate::services::translation::Translator;
use crate::store::GenerationStore;
use crate::utils::{generate_unique_id, non_blank};

/// How narration audio is produced. Chosen once from configuration.
#[derive(Clone)]
pub enum AudioStrategy {
    /// Fixed test asset; no provider is called
    Placeholder { url: String },
    Synthesized {
        speech: Arc<dyn SpeechSynthesizer>,
        storage: Arc<dyn ObjectStorage>,
        bucket: String,
        pcm_format: PcmFormat,
    },
}

impl AudioStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            AudioStrategy::Placeholder { .. } => "placeholder",
            AudioStrategy::Synthesized { .. } => "synthesized",
        }
    }

    pub fn uses_test_audio(&self) -> bool {
        matches!(self, AudioStrategy::Placeholder { .. })
    }

    async fn produce(&self, narration: &str, object_stem: &str, retry: &RetryPolicy) -> Result<String, GenerationError> {
        match self {
            AudioStrategy::Placeholder { url } => Ok(url.clone()),
            AudioStrategy::Synthesized {
                speech,
                storage,
                bucket,
                pcm_format,
            } => {
                let bytes = retry
                    .run("speech synthesis", || speech.synthesize(narration))
                    .await?;
                if bytes.is_empty() {
                    return Err(ProviderError::new("elevenlabs", None, "speech provider returned no audio").into());
                }

                let (bytes, container) = normalize_audio(bytes, *pcm_format);
                let object_name = format!("{}.{}", object_stem, container.extension());
                retry
                    .run("audio upload", || {
                        storage.upload(bucket, &object_name, bytes.clone(), container.content_type())
                    })
                    .await?;

                Ok(storage.public_url(bucket, &object_name))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    pub record: Audio,
    pub audio_url: String,
    pub used_test_audio: bool,
}

#[derive(Clone)]
pub struct AudioSynthesizer {
    store: Arc<dyn GenerationStore>,
    translator: Translator,
    strategy: AudioStrategy,
    retry: RetryPolicy,
}

impl AudioSynthesizer {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        translator: Translator,
        strategy: AudioStrategy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            translator,
            strategy,
            retry,
        }
    }

    pub fn strategy(&self) -> &AudioStrategy {
        &self.strategy
    }

    /// Narration comes from the override, else the prompt's latest script.
    pub async fn generate_audio_for_prompt(
        &self,
        prompt: &Prompt,
        narration_override: Option<&str>,
    ) -> Result<GeneratedAudio, GenerationError> {
        let script = self.store.latest_script(prompt.id).await?;

        let narration = match non_blank(narration_override.map(str::to_string)) {
            Some(text) => text,
            None => {
                let script = script
                    .as_ref()
                    .ok_or_else(|| GenerationError::MissingArtifact("Script not found for prompt".to_string()))?;
                non_blank(Some(script.narration.clone())).ok_or_else(|| {
                    GenerationError::MissingArtifact("Narration not available for audio generation".to_string())
                })?
            }
        };

        let narration = self.translator.translate_narration(&narration, &prompt.language).await?;

        let object_stem = match &script {
            Some(script) => script.script_id.clone(),
            None => format!("{}-{}", prompt.prompt_id, generate_unique_id()),
        };
        let audio_url = self.strategy.produce(&narration, &object_stem, &self.retry).await?;
        let used_test_audio = self.strategy.uses_test_audio();

        let record = self
            .store
            .create_audio(NewAudio {
                audio_url: audio_url.clone(),
                used_test_audio,
                prompt_record_id: prompt.id,
            })
            .await?;

        tracing::info!(
            prompt_id = %prompt.prompt_id,
            strategy = self.strategy.name(),
            language = %prompt.language,
            audio_url = %audio_url,
            "audio ready"
        );
        Ok(GeneratedAudio {
            record,
            audio_url,
            used_test_audio,
        })
    }
}
