// src/store/mod.rs
//! Persistence boundary for the generation record graph.
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::jobs::{CallbackReport, CallbackRejection, JobCallback};
use crate::models::generation::{
    Audio, JobPair, Mux, NewAudio, NewMux, NewPrompt, NewScript, Prompt, PromptSummary, Script,
    User, Video,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<CallbackRejection> for StoreError {
    fn from(rejection: CallbackRejection) -> Self {
        match rejection {
            CallbackRejection::MissingUrl => StoreError::Invalid(rejection.to_string()),
            other => StoreError::Conflict(other.to_string()),
        }
    }
}

#[async_trait]
pub trait GenerationStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Create the user if absent; repeated calls return the same row
    async fn upsert_user(&self, subject_id: &str) -> Result<User, StoreError>;

    /// Upsert the owning user and insert a new prompt in one transaction
    async fn create_prompt(&self, new: NewPrompt) -> Result<Prompt, StoreError>;

    async fn find_prompt(&self, prompt_id: &str) -> Result<Option<Prompt>, StoreError>;

    async fn create_script(&self, new: NewScript) -> Result<Script, StoreError>;

    async fn latest_script(&self, prompt_record_id: Uuid) -> Result<Option<Script>, StoreError>;

    async fn create_audio(&self, new: NewAudio) -> Result<Audio, StoreError>;

    async fn latest_audio(&self, prompt_record_id: Uuid) -> Result<Option<Audio>, StoreError>;

    async fn latest_completed_video(&self, prompt_record_id: Uuid) -> Result<Option<Video>, StoreError>;

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    async fn find_mux(&self, id: Uuid) -> Result<Option<Mux>, StoreError>;

    /// Insert a QUEUED video and its QUEUED mux atomically
    async fn create_job_pair(&self, prompt_record_id: Uuid) -> Result<JobPair, StoreError>;

    /// Record the job id on both rows and move QUEUED rows to PROCESSING.
    /// Rows a callback already advanced are left as they are.
    async fn mark_job_processing(&self, video_id: Uuid, mux_id: Uuid, job_id: &str) -> Result<(), StoreError>;

    /// Fail both rows unless they are already terminal
    async fn mark_job_failed(&self, video_id: Uuid, mux_id: Uuid, message: &str) -> Result<(), StoreError>;

    /// Apply a worker callback to every referenced record, all or nothing
    async fn apply_job_callback(&self, callback: &JobCallback) -> Result<CallbackReport, StoreError>;

    async fn create_completed_mux(&self, new: NewMux) -> Result<Mux, StoreError>;

    /// The subject's prompts plus ownerless legacy prompts, newest first
    async fn list_library(&self, subject_id: &str) -> Result<Vec<PromptSummary>, StoreError>;

    async fn prompt_summary(&self, prompt_id: &str) -> Result<Option<PromptSummary>, StoreError>;

    /// Assign every ownerless prompt to the subject; returns how many moved
    async fn claim_legacy_prompts(&self, subject_id: &str) -> Result<u64, StoreError>;
}
