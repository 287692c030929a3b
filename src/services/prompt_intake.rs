// src/services/prompt_intake.rs
use std::sync::Arc;

use crate::error::GenerationError;
use crate::models::generation::{NewPrompt, Prompt, UNKNOWN_SUBJECT};
use crate::store::GenerationStore;
use crate::utils::{generate_unique_id, normalize_language};

#[derive(Clone)]
pub struct PromptIntake {
    store: Arc<dyn GenerationStore>,
}

impl PromptIntake {
    pub fn new(store: Arc<dyn GenerationStore>) -> Self {
        Self { store }
    }

    /// Every call creates a brand-new prompt, even for repeated text.
    pub async fn create_prompt_for_user(
        &self,
        text: &str,
        language: Option<&str>,
        subject_id: Option<&str>,
    ) -> Result<Prompt, GenerationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Validation("Prompt is required".to_string()));
        }

        let subject_id = subject_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SUBJECT);

        let prompt = self
            .store
            .create_prompt(NewPrompt {
                prompt_id: generate_unique_id(),
                prompt: text.to_string(),
                language: normalize_language(language),
                subject_id: subject_id.to_string(),
            })
            .await?;

        tracing::info!(
            prompt_id = %prompt.prompt_id,
            language = %prompt.language,
            subject_id,
            "prompt created"
        );
        Ok(prompt)
    }

    pub async fn require_prompt(&self, prompt_id: &str) -> Result<Prompt, GenerationError> {
        self.store
            .find_prompt(prompt_id)
            .await?
            .ok_or_else(|| GenerationError::NotFound(format!("Prompt not found for promptId: {}", prompt_id)))
    }
}
