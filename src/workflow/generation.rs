// src/workflow/generation.rs
//! The synchronous half of a generation. Steps run strictly in order and the
//! call returns once the render job is queued, not when it finishes.

use crate::error::GenerationError;
use crate::jobs::dispatcher::DispatchedJob;
use crate::jobs::{RenderJobDispatcher, RenderQuality};
use crate::models::generation::Prompt;
use crate::services::{AudioSynthesizer, GeneratedAudio, GeneratedScript, PromptIntake, ScriptSynthesizer};

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub language: Option<String>,
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub prompt: Prompt,
    pub script: GeneratedScript,
    pub audio: GeneratedAudio,
    pub job: DispatchedJob,
}

#[derive(Clone)]
pub struct GenerationWorkflow {
    intake: PromptIntake,
    scripts: ScriptSynthesizer,
    audio: AudioSynthesizer,
    dispatcher: RenderJobDispatcher,
}

impl GenerationWorkflow {
    pub fn new(
        intake: PromptIntake,
        scripts: ScriptSynthesizer,
        audio: AudioSynthesizer,
        dispatcher: RenderJobDispatcher,
    ) -> Self {
        Self {
            intake,
            scripts,
            audio,
            dispatcher,
        }
    }

    pub fn intake(&self) -> &PromptIntake {
        &self.intake
    }

    pub fn scripts(&self) -> &ScriptSynthesizer {
        &self.scripts
    }

    pub fn audio(&self) -> &AudioSynthesizer {
        &self.audio
    }

    pub fn dispatcher(&self) -> &RenderJobDispatcher {
        &self.dispatcher
    }

    /// Any failure before dispatch aborts with no video or mux rows created.
    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationOutcome, GenerationError> {
        let prompt = self
            .intake
            .create_prompt_for_user(&request.prompt, request.language.as_deref(), request.subject_id.as_deref())
            .await?;

        let script = self.scripts.generate_script_for_prompt(&prompt).await?;

        let audio = self
            .audio
            .generate_audio_for_prompt(&prompt, Some(&script.output.full_narration))
            .await?;

        let job = self
            .dispatcher
            .enqueue_video_processing_job(&prompt, &script.record, &audio.audio_url, RenderQuality::default(), None)
            .await?;

        tracing::info!(
            prompt_id = %prompt.prompt_id,
            script_id = %script.record.script_id,
            job_id = %job.job_id,
            used_test_audio = audio.used_test_audio,
            "generation queued"
        );
        Ok(GenerationOutcome {
            prompt,
            script,
            audio,
            job,
        })
    }
}
