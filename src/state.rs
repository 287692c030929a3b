// src/state.rs
use std::sync::Arc;

use crate::audio::PcmFormat;
use crate::config::{AppConfig, ConfigError};
use crate::elevenlabs_client::ElevenLabsClient;
use crate::gemini_client::GeminiClient;
use crate::jobs::dispatcher::DispatchSettings;
use crate::jobs::{RenderJobDispatcher, WebhookReconciler};
use crate::middleware::identity::IdentityVerifier;
use crate::providers::{LanguageModel, ObjectStorage, RenderBackend, SpeechSynthesizer};
use crate::render_client::RenderWorkerClient;
use crate::services::{AudioStrategy, AudioSynthesizer, MuxService, PromptIntake, ScriptSynthesizer, Translator};
use crate::storage_client::SupabaseStorage;
use crate::store::GenerationStore;
use crate::workflow::GenerationWorkflow;

/// External service clients, constructed once and injected
#[derive(Clone)]
pub struct Clients {
    pub language_model: Arc<dyn LanguageModel>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub render: Arc<dyn RenderBackend>,
}

impl Clients {
    pub fn from_config(config: &AppConfig) -> Self {
        let speech = config.eleven_labs.as_ref().map(|eleven| {
            tracing::info!(voice_id = %eleven.voice_id, "Initializing Eleven Labs client...");
            Arc::new(ElevenLabsClient::new(eleven)) as Arc<dyn SpeechSynthesizer>
        });
        let storage = config
            .supabase
            .as_ref()
            .map(|supabase| Arc::new(SupabaseStorage::new(supabase)) as Arc<dyn ObjectStorage>);

        Self {
            language_model: Arc::new(GeminiClient::new(
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
            )),
            speech,
            storage,
            render: Arc::new(RenderWorkerClient::new(&config.backend_url)),
        }
    }
}

// AppState holds the store and the pipeline built on top of it
pub struct AppState {
    pub store: Arc<dyn GenerationStore>,
    pub workflow: GenerationWorkflow,
    pub mux: MuxService,
    pub reconciler: WebhookReconciler,
    pub identity: IdentityVerifier,
    pub synthesis_enabled: bool,
    pub language_model_name: String,
    pub speech_configured: bool,
    pub storage_configured: bool,
}

impl AppState {
    pub fn build(config: &AppConfig, store: Arc<dyn GenerationStore>, clients: Clients) -> Result<Self, ConfigError> {
        let retry = config.retry;

        let strategy = if config.tts_enabled {
            AudioStrategy::Synthesized {
                speech: clients
                    .speech
                    .clone()
                    .ok_or(ConfigError::Missing("ELEVEN_LABS_API_KEY"))?,
                storage: clients
                    .storage
                    .clone()
                    .ok_or(ConfigError::Missing("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY"))?,
                bucket: config.audio_bucket.clone(),
                pcm_format: PcmFormat::default(),
            }
        } else {
            tracing::warn!("ENABLE_TTS is not set. Narration will use the placeholder audio asset.");
            AudioStrategy::Placeholder {
                url: config.test_audio_url.clone(),
            }
        };

        let translator = Translator::new(clients.language_model.clone(), retry);
        let workflow = GenerationWorkflow::new(
            PromptIntake::new(store.clone()),
            ScriptSynthesizer::new(store.clone(), clients.language_model.clone(), retry),
            AudioSynthesizer::new(store.clone(), translator, strategy, retry),
            RenderJobDispatcher::new(
                store.clone(),
                clients.render.clone(),
                retry,
                DispatchSettings {
                    callback_url: config.callback_url(),
                    callback_secret: config.webhook_secret.clone(),
                    bucket_name: config.video_bucket.clone(),
                    audio_speed: config.audio_speed,
                },
            ),
        );

        if config.webhook_secret.is_none() {
            tracing::warn!("VIDEO_WEBHOOK_SECRET not set. Render callbacks will not be authenticated.");
        }

        Ok(Self {
            mux: MuxService::new(store.clone(), clients.render.clone(), retry, config.video_bucket.clone()),
            reconciler: WebhookReconciler::new(store.clone(), config.webhook_secret.clone()),
            identity: IdentityVerifier::new(config.jwt_secret.as_deref()),
            synthesis_enabled: config.tts_enabled,
            language_model_name: clients.language_model.name().to_string(),
            speech_configured: clients.speech.is_some(),
            storage_configured: clients.storage.is_some(),
            workflow,
            store,
        })
    }
}
