// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::providers::ProviderError;
use crate::store::StoreError;

/// Everything the generation pipeline and its HTTP surface can fail with
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// A step's prerequisite (script, audio, rendered video) does not exist yet
    #[error("{0}")]
    MissingArtifact(String),

    #[error("{0}")]
    Conflict(String),

    #[error("language model returned an empty response")]
    EmptyModelResponse,

    #[error("failed to parse script response: {0}")]
    ScriptParse(String),

    #[error("translation to {language} failed: {reason}")]
    TranslationFailed { language: String, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("failed to dispatch render job: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl GenerationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
            GenerationError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GenerationError::Forbidden(_) => StatusCode::FORBIDDEN,
            GenerationError::NotFound(_) => StatusCode::NOT_FOUND,
            GenerationError::MissingArtifact(_) | GenerationError::Conflict(_) => StatusCode::CONFLICT,
            GenerationError::EmptyModelResponse
            | GenerationError::ScriptParse(_)
            | GenerationError::TranslationFailed { .. }
            | GenerationError::Provider(_)
            | GenerationError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            GenerationError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            GenerationError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            GenerationError::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            GenerationError::Store(StoreError::Database(_)) | GenerationError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }

        let message = match &self {
            // Database details stay in the logs
            GenerationError::Store(StoreError::Database(_)) => "Internal storage error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
