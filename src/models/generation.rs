use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::jobs::JobStatus;
use crate::utils::preview;

/// Owner recorded for prompts created without an identity
pub const UNKNOWN_SUBJECT: &str = "unknown";
pub const DEFAULT_LANGUAGE: &str = "english";

const TITLE_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: Uuid,
    pub prompt_id: String,
    pub prompt: String,
    pub language: String,
    pub subject_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    /// Prompts created before identities were recorded
    pub fn is_legacy(&self) -> bool {
        is_legacy_owner(self.subject_id.as_deref())
    }

    pub fn is_visible_to(&self, subject_id: &str) -> bool {
        self.is_legacy() || self.subject_id.as_deref() == Some(subject_id)
    }
}

pub fn is_legacy_owner(subject_id: Option<&str>) -> bool {
    match subject_id {
        None => true,
        Some(owner) => owner == UNKNOWN_SUBJECT,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: Uuid,
    pub script_id: String,
    pub script: String,
    pub narration: String,
    pub explanation: String,
    pub prompt_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Audio {
    pub id: Uuid,
    pub audio_url: String,
    pub used_test_audio: bool,
    pub prompt_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub video_url: Option<String>,
    pub status: JobStatus,
    pub job_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mux {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub video_id: Option<Uuid>,
    pub final_video_url: Option<String>,
    pub status: JobStatus,
    pub job_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub prompt_id: String,
    pub prompt: String,
    pub language: String,
    pub subject_id: String,
}

#[derive(Debug, Clone)]
pub struct NewScript {
    pub script_id: String,
    pub script: String,
    pub narration: String,
    pub explanation: String,
    pub prompt_record_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewAudio {
    pub audio_url: String,
    pub used_test_audio: bool,
    pub prompt_record_id: Uuid,
}

/// A mux produced synchronously, stored already COMPLETED
#[derive(Debug, Clone)]
pub struct NewMux {
    pub prompt_record_id: Uuid,
    pub video_id: Option<Uuid>,
    pub final_video_url: String,
}

/// Video and mux rows created together for one render job
#[derive(Debug, Clone)]
pub struct JobPair {
    pub video: Video,
    pub mux: Mux,
}

/// A prompt with the latest artifacts used by the library views
#[derive(Debug, Clone)]
pub struct PromptSummary {
    pub prompt: Prompt,
    pub latest_script: Option<Script>,
    pub latest_mux: Option<Mux>,
}

impl PromptSummary {
    pub fn title(&self) -> String {
        match &self.latest_script {
            Some(script) if !script.explanation.trim().is_empty() => script.explanation.clone(),
            _ => preview(&self.prompt.prompt, TITLE_PREVIEW_CHARS),
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        self.latest_mux.as_ref().and_then(|mux| mux.final_video_url.as_deref())
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.latest_mux.as_ref().map(|mux| mux.status)
    }
}
