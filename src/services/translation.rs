// src/services/translation.rs
use std::sync::Arc;

use crate::error::GenerationError;
use crate::providers::{LanguageModel, ModelRequest};
use crate::retry::RetryPolicy;
use crate::utils::is_default_language;

const TRANSLATION_INSTRUCTION: &str = "You translate narration for educational videos. \
Use a casual, conversational register, the way a friendly tutor would speak. \
Keep technical terms accurate. Reply with the translated narration only, without notes or quotes.";

#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl Translator {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Rewrite narration into `target_language`. The default language is
    /// returned untouched; an empty translation is an error, never a fallback.
    pub async fn translate_narration(&self, text: &str, target_language: &str) -> Result<String, GenerationError> {
        if is_default_language(target_language) {
            return Ok(text.to_string());
        }

        let request = ModelRequest {
            system_instruction: Some(TRANSLATION_INSTRUCTION.to_string()),
            prompt: format!(
                "Translate the following narration into {}:\n\n{}",
                target_language.trim(),
                text
            ),
            response_schema: None,
        };

        let translated = self
            .retry
            .run("narration translation", || self.model.generate(&request))
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GenerationError::TranslationFailed {
                language: target_language.to_string(),
                reason: "language model returned no text".to_string(),
            })?;

        tracing::info!(
            language = %target_language,
            source_chars = text.chars().count(),
            translated_chars = translated.chars().count(),
            "narration translated"
        );
        Ok(translated)
    }
}
