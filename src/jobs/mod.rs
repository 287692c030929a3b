// src/jobs/mod.rs
//! Render job lifecycle: the status enum, its transition table, and the
//! planning step that turns a worker callback into record updates.
pub mod dispatcher;
pub mod reconciler;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use dispatcher::{RenderJobDispatcher, RenderQuality};
pub use reconciler::{WebhookReconciler, CALLBACK_SECRET_HEADER};

pub const DEFAULT_FAILURE_MESSAGE: &str = "Video rendering failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Case-insensitive, whitespace-tolerant parse of a wire status
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Some(JobStatus::Queued),
            "PROCESSING" => Some(JobStatus::Processing),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    Unchanged,
    /// The record already reached COMPLETED or FAILED; replays land here
    AlreadyTerminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move a {from} record back to {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// QUEUED -> PROCESSING -> {COMPLETED | FAILED}. Terminal states never move.
pub fn transition(from: JobStatus, to: JobStatus) -> Result<Transition, InvalidTransition> {
    use JobStatus::*;

    match (from, to) {
        (Completed | Failed, _) => Ok(Transition::AlreadyTerminal),
        (Queued, Queued) | (Processing, Processing) => Ok(Transition::Unchanged),
        (Queued, Processing | Completed | Failed) | (Processing, Completed | Failed) => {
            Ok(Transition::Apply)
        }
        (Processing, Queued) => Err(InvalidTransition { from, to }),
    }
}

/// A record named by a callback together with the URL reported for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTarget {
    pub record_id: Uuid,
    pub url: Option<String>,
}

/// A validated worker callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCallback {
    pub job_id: Option<String>,
    pub prompt_id: Option<String>,
    pub status: JobStatus,
    pub video: Option<RecordTarget>,
    pub mux: Option<RecordTarget>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackRejection {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("callback job id {incoming} does not match recorded job id {recorded}")]
    JobIdMismatch { recorded: String, incoming: String },
    #[error("completed callback carries no output url")]
    MissingUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Apply {
        status: JobStatus,
        url: Option<String>,
        error_message: Option<String>,
        adopt_job_id: Option<String>,
    },
    NoOp,
}

/// Prefix of job ids minted locally when the worker did not return one
pub const LOCAL_JOB_PREFIX: &str = "local-";

/// A locally minted id is a placeholder until the worker reports its own
pub fn is_provisional_job_id(job_id: &str) -> bool {
    job_id.starts_with(LOCAL_JOB_PREFIX)
}

/// Decide what a callback does to one record in its current state.
/// Terminal records absorb every replay before job ids are compared.
pub fn plan_change(
    current_status: JobStatus,
    current_job_id: Option<&str>,
    callback: &JobCallback,
    url: Option<&str>,
) -> Result<RecordChange, CallbackRejection> {
    let step = transition(current_status, callback.status)?;
    if step == Transition::AlreadyTerminal {
        return Ok(RecordChange::NoOp);
    }

    let adopt_job_id = match (current_job_id, callback.job_id.as_deref()) {
        (Some(recorded), Some(incoming)) if recorded == incoming => None,
        (Some(recorded), Some(incoming)) if !is_provisional_job_id(recorded) => {
            return Err(CallbackRejection::JobIdMismatch {
                recorded: recorded.to_string(),
                incoming: incoming.to_string(),
            });
        }
        (_, incoming) => incoming.map(str::to_string),
    };

    match step {
        Transition::AlreadyTerminal | Transition::Unchanged => Ok(RecordChange::NoOp),
        Transition::Apply => {
            let url = match callback.status {
                JobStatus::Completed => Some(url.ok_or(CallbackRejection::MissingUrl)?.to_string()),
                _ => None,
            };
            let error_message = match callback.status {
                JobStatus::Failed => Some(
                    callback
                        .error_message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
                ),
                _ => None,
            };
            Ok(RecordChange::Apply {
                status: callback.status,
                url,
                error_message,
                adopt_job_id,
            })
        }
    }
}

/// How many referenced records a callback changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackReport {
    pub applied: usize,
    pub unchanged: usize,
}

impl CallbackReport {
    pub fn record(&mut self, change: &RecordChange) {
        match change {
            RecordChange::Apply { .. } => self.applied += 1,
            RecordChange::NoOp => self.unchanged += 1,
        }
    }
}
