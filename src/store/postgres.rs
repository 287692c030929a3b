// src/store/postgres.rs
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{GenerationStore, StoreError};
use crate::jobs::{plan_change, CallbackReport, JobCallback, JobStatus, RecordChange};
use crate::models::generation::{
    Audio, JobPair, Mux, NewAudio, NewMux, NewPrompt, NewScript, Prompt, PromptSummary, Script,
    User, Video, UNKNOWN_SUBJECT,
};

const USER_COLUMNS: &str = "id, subject_id, created_at, updated_at";
const PROMPT_COLUMNS: &str = "id, prompt_id, prompt, language, subject_id, created_at, updated_at";
const SCRIPT_COLUMNS: &str = "id, script_id, script, narration, explanation, prompt_id, created_at";
const AUDIO_COLUMNS: &str = "id, audio_url, used_test_audio, prompt_id, created_at";
const VIDEO_COLUMNS: &str =
    "id, prompt_id, video_url, status, job_id, error_message, created_at, updated_at";
const MUX_COLUMNS: &str =
    "id, prompt_id, video_id, final_video_url, status, job_id, error_message, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn summarize(&self, prompt: Prompt) -> Result<PromptSummary, StoreError> {
        let latest_script = self.latest_script(prompt.id).await?;
        let latest_mux = sqlx::query_as::<_, Mux>(&format!(
            "SELECT {MUX_COLUMNS} FROM muxes WHERE prompt_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(prompt.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(PromptSummary {
            prompt,
            latest_script,
            latest_mux,
        })
    }
}

async fn upsert_user_in(conn: &mut PgConnection, subject_id: &str) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, subject_id) VALUES ($1, $2)
         ON CONFLICT (subject_id) DO UPDATE SET subject_id = EXCLUDED.subject_id
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(subject_id)
    .fetch_one(conn)
    .await
}

async fn apply_video_change(
    conn: &mut PgConnection,
    callback: &JobCallback,
    record_id: Uuid,
    url: Option<&str>,
) -> Result<RecordChange, StoreError> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1 FOR UPDATE"
    ))
    .bind(record_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("video", record_id))?;

    let change = plan_change(video.status, video.job_id.as_deref(), callback, url)?;
    if let RecordChange::Apply {
        status,
        url,
        error_message,
        adopt_job_id,
    } = &change
    {
        sqlx::query(
            "UPDATE videos
             SET status = $2, video_url = $3, error_message = $4,
                 job_id = COALESCE($5, job_id), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(record_id)
        .bind(status)
        .bind(url)
        .bind(error_message)
        .bind(adopt_job_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(change)
}

async fn apply_mux_change(
    conn: &mut PgConnection,
    callback: &JobCallback,
    record_id: Uuid,
    url: Option<&str>,
) -> Result<RecordChange, StoreError> {
    let mux = sqlx::query_as::<_, Mux>(&format!(
        "SELECT {MUX_COLUMNS} FROM muxes WHERE id = $1 FOR UPDATE"
    ))
    .bind(record_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("mux", record_id))?;

    let change = plan_change(mux.status, mux.job_id.as_deref(), callback, url)?;
    if let RecordChange::Apply {
        status,
        url,
        error_message,
        adopt_job_id,
    } = &change
    {
        sqlx::query(
            "UPDATE muxes
             SET status = $2, final_video_url = $3, error_message = $4,
                 job_id = COALESCE($5, job_id), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(record_id)
        .bind(status)
        .bind(url)
        .bind(error_message)
        .bind(adopt_job_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(change)
}

#[async_trait]
impl GenerationStore for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_user(&self, subject_id: &str) -> Result<User, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(upsert_user_in(&mut *conn, subject_id).await?)
    }

    async fn create_prompt(&self, new: NewPrompt) -> Result<Prompt, StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_user_in(&mut *tx, &new.subject_id).await?;
        let prompt = sqlx::query_as::<_, Prompt>(&format!(
            "INSERT INTO prompts (id, prompt_id, prompt, language, subject_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PROMPT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.prompt_id)
        .bind(&new.prompt)
        .bind(&new.language)
        .bind(&new.subject_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(prompt)
    }

    async fn find_prompt(&self, prompt_id: &str) -> Result<Option<Prompt>, StoreError> {
        let prompt = sqlx::query_as::<_, Prompt>(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompts WHERE prompt_id = $1"
        ))
        .bind(prompt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(prompt)
    }

    async fn create_script(&self, new: NewScript) -> Result<Script, StoreError> {
        let script = sqlx::query_as::<_, Script>(&format!(
            "INSERT INTO scripts (id, script_id, script, narration, explanation, prompt_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {SCRIPT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.script_id)
        .bind(&new.script)
        .bind(&new.narration)
        .bind(&new.explanation)
        .bind(new.prompt_record_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(script)
    }

    async fn latest_script(&self, prompt_record_id: Uuid) -> Result<Option<Script>, StoreError> {
        let script = sqlx::query_as::<_, Script>(&format!(
            "SELECT {SCRIPT_COLUMNS} FROM scripts WHERE prompt_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(prompt_record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(script)
    }

    async fn create_audio(&self, new: NewAudio) -> Result<Audio, StoreError> {
        let audio = sqlx::query_as::<_, Audio>(&format!(
            "INSERT INTO audios (id, audio_url, used_test_audio, prompt_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {AUDIO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.audio_url)
        .bind(new.used_test_audio)
        .bind(new.prompt_record_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(audio)
    }

    async fn latest_audio(&self, prompt_record_id: Uuid) -> Result<Option<Audio>, StoreError> {
        let audio = sqlx::query_as::<_, Audio>(&format!(
            "SELECT {AUDIO_COLUMNS} FROM audios WHERE prompt_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(prompt_record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(audio)
    }

    async fn latest_completed_video(&self, prompt_record_id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE prompt_id = $1 AND status = 'COMPLETED'
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(prompt_record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        let video = sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn find_mux(&self, id: Uuid) -> Result<Option<Mux>, StoreError> {
        let mux = sqlx::query_as::<_, Mux>(&format!("SELECT {MUX_COLUMNS} FROM muxes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mux)
    }

    async fn create_job_pair(&self, prompt_record_id: Uuid) -> Result<JobPair, StoreError> {
        let mut tx = self.pool.begin().await?;

        let video = sqlx::query_as::<_, Video>(&format!(
            "INSERT INTO videos (id, prompt_id, status) VALUES ($1, $2, 'QUEUED')
             RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(prompt_record_id)
        .fetch_one(&mut *tx)
        .await?;

        let mux = sqlx::query_as::<_, Mux>(&format!(
            "INSERT INTO muxes (id, prompt_id, video_id, status) VALUES ($1, $2, $3, 'QUEUED')
             RETURNING {MUX_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(prompt_record_id)
        .bind(video.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(JobPair { video, mux })
    }

    async fn mark_job_processing(&self, video_id: Uuid, mux_id: Uuid, job_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for (table, entity, id) in [("videos", "video", video_id), ("muxes", "mux", mux_id)] {
            let result = sqlx::query(&format!(
                "UPDATE {table}
                 SET job_id = COALESCE(job_id, $2),
                     status = CASE WHEN status = 'QUEUED' THEN 'PROCESSING'::job_status ELSE status END,
                     updated_at = NOW()
                 WHERE id = $1"
            ))
            .bind(id)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::not_found(entity, id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn mark_job_failed(&self, video_id: Uuid, mux_id: Uuid, message: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for (table, id) in [("videos", video_id), ("muxes", mux_id)] {
            sqlx::query(&format!(
                "UPDATE {table}
                 SET status = 'FAILED', error_message = $2, updated_at = NOW()
                 WHERE id = $1 AND status IN ('QUEUED', 'PROCESSING')"
            ))
            .bind(id)
            .bind(message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_job_callback(&self, callback: &JobCallback) -> Result<CallbackReport, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut report = CallbackReport::default();

        if let Some(prompt_id) = &callback.prompt_id {
            let touched = sqlx::query("UPDATE prompts SET updated_at = NOW() WHERE prompt_id = $1")
                .bind(prompt_id)
                .execute(&mut *tx)
                .await?;
            if touched.rows_affected() == 0 {
                return Err(StoreError::not_found("prompt", prompt_id));
            }
        }

        // Lock order: videos before muxes
        if let Some(target) = &callback.video {
            let change = apply_video_change(&mut *tx, callback, target.record_id, target.url.as_deref()).await?;
            report.record(&change);
        }
        if let Some(target) = &callback.mux {
            let change = apply_mux_change(&mut *tx, callback, target.record_id, target.url.as_deref()).await?;
            report.record(&change);
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn create_completed_mux(&self, new: NewMux) -> Result<Mux, StoreError> {
        let mux = sqlx::query_as::<_, Mux>(&format!(
            "INSERT INTO muxes (id, prompt_id, video_id, final_video_url, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {MUX_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.prompt_record_id)
        .bind(new.video_id)
        .bind(&new.final_video_url)
        .bind(JobStatus::Completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(mux)
    }

    async fn list_library(&self, subject_id: &str) -> Result<Vec<PromptSummary>, StoreError> {
        let prompts = sqlx::query_as::<_, Prompt>(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompts
             WHERE subject_id = $1 OR subject_id IS NULL OR subject_id = $2
             ORDER BY created_at DESC"
        ))
        .bind(subject_id)
        .bind(UNKNOWN_SUBJECT)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            summaries.push(self.summarize(prompt).await?);
        }
        Ok(summaries)
    }

    async fn prompt_summary(&self, prompt_id: &str) -> Result<Option<PromptSummary>, StoreError> {
        match self.find_prompt(prompt_id).await? {
            Some(prompt) => Ok(Some(self.summarize(prompt).await?)),
            None => Ok(None),
        }
    }

    async fn claim_legacy_prompts(&self, subject_id: &str) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_user_in(&mut *tx, subject_id).await?;
        let result = sqlx::query(
            "UPDATE prompts SET subject_id = $1, updated_at = NOW()
             WHERE subject_id IS NULL OR subject_id = $2",
        )
        .bind(subject_id)
        .bind(UNKNOWN_SUBJECT)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
