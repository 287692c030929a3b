// src/store/memory.rs
//! In-process store used by tests and database-less local runs. One mutex
//! guards every table; multi-record writes validate first, then apply.
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{GenerationStore, StoreError};
use crate::jobs::{plan_change, CallbackReport, JobCallback, JobStatus, RecordChange};
use crate::models::generation::{
    is_legacy_owner, Audio, JobPair, Mux, NewAudio, NewMux, NewPrompt, NewScript, Prompt,
    PromptSummary, Script, User, Video,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    prompts: Vec<Prompt>,
    scripts: Vec<Script>,
    audios: Vec<Audio>,
    videos: Vec<Video>,
    muxes: Vec<Mux>,
}

impl Tables {
    fn upsert_user(&mut self, subject_id: &str) -> User {
        if let Some(user) = self.users.iter().find(|u| u.subject_id == subject_id) {
            return user.clone();
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.users.push(user.clone());
        user
    }

    // Rows are appended in creation order, so the last match is the newest
    fn latest_script(&self, prompt_record_id: Uuid) -> Option<Script> {
        self.scripts.iter().rev().find(|s| s.prompt_id == prompt_record_id).cloned()
    }

    fn latest_mux(&self, prompt_record_id: Uuid) -> Option<Mux> {
        self.muxes.iter().rev().find(|m| m.prompt_id == prompt_record_id).cloned()
    }

    fn summarize(&self, prompt: &Prompt) -> PromptSummary {
        PromptSummary {
            prompt: prompt.clone(),
            latest_script: self.latest_script(prompt.id),
            latest_mux: self.latest_mux(prompt.id),
        }
    }

    fn video_index(&self, id: Uuid) -> Result<usize, StoreError> {
        self.videos
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| StoreError::not_found("video", id))
    }

    fn mux_index(&self, id: Uuid) -> Result<usize, StoreError> {
        self.muxes
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| StoreError::not_found("mux", id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    pub async fn videos(&self) -> Vec<Video> {
        self.tables.lock().await.videos.clone()
    }

    pub async fn muxes(&self) -> Vec<Mux> {
        self.tables.lock().await.muxes.clone()
    }

    pub async fn scripts(&self) -> Vec<Script> {
        self.tables.lock().await.scripts.clone()
    }

    pub async fn audios(&self) -> Vec<Audio> {
        self.tables.lock().await.audios.clone()
    }
}

#[async_trait]
impl GenerationStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "in_memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_user(&self, subject_id: &str) -> Result<User, StoreError> {
        Ok(self.tables.lock().await.upsert_user(subject_id))
    }

    async fn create_prompt(&self, new: NewPrompt) -> Result<Prompt, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.prompts.iter().any(|p| p.prompt_id == new.prompt_id) {
            return Err(StoreError::Conflict(format!("prompt {} already exists", new.prompt_id)));
        }

        tables.upsert_user(&new.subject_id);
        let now = Utc::now();
        let prompt = Prompt {
            id: Uuid::new_v4(),
            prompt_id: new.prompt_id,
            prompt: new.prompt,
            language: new.language,
            subject_id: Some(new.subject_id),
            created_at: now,
            updated_at: now,
        };
        tables.prompts.push(prompt.clone());
        Ok(prompt)
    }

    async fn find_prompt(&self, prompt_id: &str) -> Result<Option<Prompt>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.prompts.iter().find(|p| p.prompt_id == prompt_id).cloned())
    }

    async fn create_script(&self, new: NewScript) -> Result<Script, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.prompts.iter().any(|p| p.id == new.prompt_record_id) {
            return Err(StoreError::not_found("prompt", new.prompt_record_id));
        }
        let script = Script {
            id: Uuid::new_v4(),
            script_id: new.script_id,
            script: new.script,
            narration: new.narration,
            explanation: new.explanation,
            prompt_id: new.prompt_record_id,
            created_at: Utc::now(),
        };
        tables.scripts.push(script.clone());
        Ok(script)
    }

    async fn latest_script(&self, prompt_record_id: Uuid) -> Result<Option<Script>, StoreError> {
        Ok(self.tables.lock().await.latest_script(prompt_record_id))
    }

    async fn create_audio(&self, new: NewAudio) -> Result<Audio, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.prompts.iter().any(|p| p.id == new.prompt_record_id) {
            return Err(StoreError::not_found("prompt", new.prompt_record_id));
        }
        let audio = Audio {
            id: Uuid::new_v4(),
            audio_url: new.audio_url,
            used_test_audio: new.used_test_audio,
            prompt_id: new.prompt_record_id,
            created_at: Utc::now(),
        };
        tables.audios.push(audio.clone());
        Ok(audio)
    }

    async fn latest_audio(&self, prompt_record_id: Uuid) -> Result<Option<Audio>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.audios.iter().rev().find(|a| a.prompt_id == prompt_record_id).cloned())
    }

    async fn latest_completed_video(&self, prompt_record_id: Uuid) -> Result<Option<Video>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .videos
            .iter()
            .rev()
            .find(|v| v.prompt_id == prompt_record_id && v.status == JobStatus::Completed)
            .cloned())
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.videos.iter().find(|v| v.id == id).cloned())
    }

    async fn find_mux(&self, id: Uuid) -> Result<Option<Mux>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.muxes.iter().find(|m| m.id == id).cloned())
    }

    async fn create_job_pair(&self, prompt_record_id: Uuid) -> Result<JobPair, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.prompts.iter().any(|p| p.id == prompt_record_id) {
            return Err(StoreError::not_found("prompt", prompt_record_id));
        }

        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            prompt_id: prompt_record_id,
            video_url: None,
            status: JobStatus::Queued,
            job_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let mux = Mux {
            id: Uuid::new_v4(),
            prompt_id: prompt_record_id,
            video_id: Some(video.id),
            final_video_url: None,
            status: JobStatus::Queued,
            job_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tables.videos.push(video.clone());
        tables.muxes.push(mux.clone());
        Ok(JobPair { video, mux })
    }

    async fn mark_job_processing(&self, video_id: Uuid, mux_id: Uuid, job_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let video_index = tables.video_index(video_id)?;
        let mux_index = tables.mux_index(mux_id)?;
        let now = Utc::now();

        let video = &mut tables.videos[video_index];
        video.job_id.get_or_insert_with(|| job_id.to_string());
        if video.status == JobStatus::Queued {
            video.status = JobStatus::Processing;
        }
        video.updated_at = now;

        let mux = &mut tables.muxes[mux_index];
        mux.job_id.get_or_insert_with(|| job_id.to_string());
        if mux.status == JobStatus::Queued {
            mux.status = JobStatus::Processing;
        }
        mux.updated_at = now;
        Ok(())
    }

    async fn mark_job_failed(&self, video_id: Uuid, mux_id: Uuid, message: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if let Some(video) = tables.videos.iter_mut().find(|v| v.id == video_id) {
            if !video.status.is_terminal() {
                video.status = JobStatus::Failed;
                video.error_message = Some(message.to_string());
                video.updated_at = now;
            }
        }
        if let Some(mux) = tables.muxes.iter_mut().find(|m| m.id == mux_id) {
            if !mux.status.is_terminal() {
                mux.status = JobStatus::Failed;
                mux.error_message = Some(message.to_string());
                mux.updated_at = now;
            }
        }
        Ok(())
    }

    async fn apply_job_callback(&self, callback: &JobCallback) -> Result<CallbackReport, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut report = CallbackReport::default();

        let prompt_index = match &callback.prompt_id {
            Some(prompt_id) => Some(
                tables
                    .prompts
                    .iter()
                    .position(|p| &p.prompt_id == prompt_id)
                    .ok_or_else(|| StoreError::not_found("prompt", prompt_id))?,
            ),
            None => None,
        };

        let video_change = match &callback.video {
            Some(target) => {
                let index = tables.video_index(target.record_id)?;
                let video = &tables.videos[index];
                let change = plan_change(video.status, video.job_id.as_deref(), callback, target.url.as_deref())?;
                Some((index, change))
            }
            None => None,
        };
        let mux_change = match &callback.mux {
            Some(target) => {
                let index = tables.mux_index(target.record_id)?;
                let mux = &tables.muxes[index];
                let change = plan_change(mux.status, mux.job_id.as_deref(), callback, target.url.as_deref())?;
                Some((index, change))
            }
            None => None,
        };

        // Everything validated; apply
        let now = Utc::now();
        if let Some(index) = prompt_index {
            tables.prompts[index].updated_at = now;
        }
        if let Some((index, change)) = video_change {
            report.record(&change);
            if let RecordChange::Apply { status, url, error_message, adopt_job_id } = change {
                let video = &mut tables.videos[index];
                video.status = status;
                video.video_url = url;
                video.error_message = error_message;
                if adopt_job_id.is_some() {
                    video.job_id = adopt_job_id;
                }
                video.updated_at = now;
            }
        }
        if let Some((index, change)) = mux_change {
            report.record(&change);
            if let RecordChange::Apply { status, url, error_message, adopt_job_id } = change {
                let mux = &mut tables.muxes[index];
                mux.status = status;
                mux.final_video_url = url;
                mux.error_message = error_message;
                if adopt_job_id.is_some() {
                    mux.job_id = adopt_job_id;
                }
                mux.updated_at = now;
            }
        }

        Ok(report)
    }

    async fn create_completed_mux(&self, new: NewMux) -> Result<Mux, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.prompts.iter().any(|p| p.id == new.prompt_record_id) {
            return Err(StoreError::not_found("prompt", new.prompt_record_id));
        }
        let now = Utc::now();
        let mux = Mux {
            id: Uuid::new_v4(),
            prompt_id: new.prompt_record_id,
            video_id: new.video_id,
            final_video_url: Some(new.final_video_url),
            status: JobStatus::Completed,
            job_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tables.muxes.push(mux.clone());
        Ok(mux)
    }

    async fn list_library(&self, subject_id: &str) -> Result<Vec<PromptSummary>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .prompts
            .iter()
            .rev()
            .filter(|p| p.is_visible_to(subject_id))
            .map(|p| tables.summarize(p))
            .collect())
    }

    async fn prompt_summary(&self, prompt_id: &str) -> Result<Option<PromptSummary>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .prompts
            .iter()
            .find(|p| p.prompt_id == prompt_id)
            .map(|p| tables.summarize(p)))
    }

    async fn claim_legacy_prompts(&self, subject_id: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.upsert_user(subject_id);

        let now = Utc::now();
        let mut claimed = 0;
        for prompt in tables.prompts.iter_mut() {
            if is_legacy_owner(prompt.subject_id.as_deref()) {
                prompt.subject_id = Some(subject_id.to_string());
                prompt.updated_at = now;
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}
