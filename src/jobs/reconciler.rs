// src/jobs/reconciler.rs
//! Inbound side of the render job: authenticates and validates worker
//! callbacks, then applies them through the store in one transaction.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::{CallbackReport, JobCallback, JobStatus, RecordTarget, DEFAULT_FAILURE_MESSAGE};
use crate::error::GenerationError;
use crate::store::GenerationStore;

pub const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

/// Wire shape of a callback. Fields stay untyped so a wrong type is reported
/// as a validation error rather than a decode failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackPayload {
    job_id: Option<Value>,
    prompt_id: Option<Value>,
    video_record_id: Option<Value>,
    mux_record_id: Option<Value>,
    status: Option<Value>,
    video_url: Option<Value>,
    final_video_url: Option<Value>,
    error: Option<Value>,
    message: Option<Value>,
}

fn text(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Strings pass through; any other JSON is stringified
fn coerce_message(value: &Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn record_target(raw: Option<String>, url: Option<String>, entity: &str) -> Result<Option<RecordTarget>, GenerationError> {
    match raw {
        None => Ok(None),
        Some(raw) => {
            let record_id = Uuid::parse_str(&raw)
                .map_err(|_| GenerationError::NotFound(format!("{} record {} not found", entity, raw)))?;
            Ok(Some(RecordTarget { record_id, url }))
        }
    }
}

/// Validate a callback body into a `JobCallback`
pub fn parse_callback(body: &[u8]) -> Result<JobCallback, GenerationError> {
    let payload: CallbackPayload = serde_json::from_slice(body)
        .map_err(|e| GenerationError::Validation(format!("Invalid JSON payload: {}", e)))?;

    let status = text(&payload.status)
        .as_deref()
        .and_then(JobStatus::parse)
        .ok_or_else(|| GenerationError::Validation("Invalid or missing status".to_string()))?;

    let video_ref = text(&payload.video_record_id);
    let mux_ref = text(&payload.mux_record_id);
    if video_ref.is_none() && mux_ref.is_none() {
        return Err(GenerationError::Validation(
            "videoRecordId or muxRecordId is required".to_string(),
        ));
    }

    let video_url = text(&payload.video_url);
    let final_video_url = text(&payload.final_video_url);
    if status == JobStatus::Completed {
        if video_ref.is_some() && video_url.is_none() {
            return Err(GenerationError::Validation("videoUrl is required for a completed video".to_string()));
        }
        if mux_ref.is_some() && final_video_url.is_none() {
            return Err(GenerationError::Validation(
                "finalVideoUrl is required for a completed mux".to_string(),
            ));
        }
    }

    let error_message = match status {
        JobStatus::Failed => Some(
            coerce_message(&payload.error)
                .or_else(|| coerce_message(&payload.message))
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        ),
        _ => None,
    };

    Ok(JobCallback {
        job_id: text(&payload.job_id),
        prompt_id: text(&payload.prompt_id),
        status,
        video: record_target(video_ref, video_url, "Video")?,
        mux: record_target(mux_ref, final_video_url, "Mux")?,
        error_message,
    })
}

#[derive(Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn GenerationStore>,
    secret: Option<String>,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn GenerationStore>, secret: Option<String>) -> Self {
        let secret = secret.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self { store, secret }
    }

    pub fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn authenticate(&self, provided: Option<&str>) -> Result<(), GenerationError> {
        match &self.secret {
            None => Ok(()),
            Some(expected) if provided.map(str::trim) == Some(expected.as_str()) => Ok(()),
            Some(_) => Err(GenerationError::Unauthorized("Invalid callback secret".to_string())),
        }
    }

    /// Authenticate before reading the body, validate before touching records
    pub async fn reconcile(&self, provided_secret: Option<&str>, body: &[u8]) -> Result<CallbackReport, GenerationError> {
        self.authenticate(provided_secret)?;
        let callback = parse_callback(body)?;

        let report = self.store.apply_job_callback(&callback).await?;
        tracing::info!(
            job_id = callback.job_id.as_deref().unwrap_or("-"),
            status = %callback.status,
            video_id = ?callback.video.as_ref().map(|t| t.record_id),
            mux_id = ?callback.mux.as_ref().map(|t| t.record_id),
            applied = report.applied,
            unchanged = report.unchanged,
            "render callback reconciled"
        );
        Ok(report)
    }
}
