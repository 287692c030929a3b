// src/config.rs
//! Environment configuration. Read once at startup and passed down.
use std::collections::HashMap;
use std::time::Duration;

use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::utils::non_blank;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_APP_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_VIDEO_BUCKET: &str = "muxvideos";
pub const DEFAULT_AUDIO_BUCKET: &str = "audio";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";
pub const DEFAULT_TTS_MODEL_ID: &str = "eleven_multilingual_v2";
pub const DEFAULT_TTS_OUTPUT_FORMAT: &str = "mp3_44100_128";
pub const WEBHOOK_PATH: &str = "/webhooks/video-generation";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub tts_enabled: bool,
    pub backend_url: String,
    pub app_base_url: String,
    pub video_callback_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub test_audio_url: String,
    pub video_bucket: String,
    pub audio_bucket: String,
    pub audio_speed: f64,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub eleven_labs: Option<ElevenLabsConfig>,
    pub supabase: Option<SupabaseConfig>,
    pub jwt_secret: Option<String>,
    pub retry: RetryPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| non_blank(lookup(name));

        let backend_url = trim_slash(get("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()));
        let tts_enabled = get("ENABLE_TTS").map_or(false, |v| v.eq_ignore_ascii_case("true"));

        let eleven_labs = get("ELEVEN_LABS_API_KEY").map(|api_key| ElevenLabsConfig {
            api_key,
            voice_id: get("ELEVEN_LABS_VOICE_ID").unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            model_id: get("ELEVEN_LABS_MODEL_ID").unwrap_or_else(|| DEFAULT_TTS_MODEL_ID.to_string()),
            output_format: get("ELEVEN_LABS_OUTPUT_FORMAT")
                .unwrap_or_else(|| DEFAULT_TTS_OUTPUT_FORMAT.to_string()),
        });
        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseConfig {
                url: trim_slash(url),
                service_role_key,
            }),
            _ => None,
        };

        if tts_enabled {
            if eleven_labs.is_none() {
                return Err(ConfigError::Missing("ELEVEN_LABS_API_KEY"));
            }
            if supabase.is_none() {
                return Err(ConfigError::Missing("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY"));
            }
        }

        let audio_speed = match get("AUDIO_SPEED") {
            Some(raw) => match raw.parse::<f64>() {
                Ok(speed) if speed.is_finite() && speed > 0.0 => speed,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "AUDIO_SPEED",
                        reason: format!("expected a positive number, got {:?}", raw),
                    })
                }
            },
            None => 1.0,
        };

        let max_attempts = parse_or("RETRY_MAX_ATTEMPTS", get("RETRY_MAX_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS)?;
        let base_delay_ms = parse_or("RETRY_BASE_DELAY_MS", get("RETRY_BASE_DELAY_MS"), 1000u64)?;

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            tts_enabled,
            test_audio_url: get("TEST_AUDIO_URL")
                .unwrap_or_else(|| format!("{}/static/test-audio.mp3", backend_url)),
            backend_url,
            app_base_url: trim_slash(get("APP_BASE_URL").unwrap_or_else(|| DEFAULT_APP_BASE_URL.to_string())),
            video_callback_url: get("VIDEO_CALLBACK_URL"),
            webhook_secret: get("VIDEO_WEBHOOK_SECRET"),
            video_bucket: get("VIDEO_BUCKET_NAME").unwrap_or_else(|| DEFAULT_VIDEO_BUCKET.to_string()),
            audio_bucket: get("AUDIO_BUCKET_NAME").unwrap_or_else(|| DEFAULT_AUDIO_BUCKET.to_string()),
            audio_speed,
            gemini_api_key: get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            eleven_labs,
            supabase,
            jwt_secret: get("JWT_SECRET"),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
        })
    }

    /// Where the render worker reports back: the explicit override, else
    /// the webhook route under the application base URL
    pub fn callback_url(&self) -> String {
        match &self.video_callback_url {
            Some(url) => url.clone(),
            None => format!("{}{}", self.app_base_url, WEBHOOK_PATH),
        }
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_or<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("could not parse {:?}", value),
        }),
        None => Ok(default),
    }
}
