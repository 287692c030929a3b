// src/services/script_synthesis.rs
//! Structured script generation: one language model call per script, parsed
//! into scenes and flattened into render code and narration.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::GenerationError;
use crate::models::generation::{NewScript, Prompt, Script};
use crate::providers::{LanguageModel, ModelRequest};
use crate::retry::RetryPolicy;
use crate::store::GenerationStore;
use crate::utils::generate_unique_id;

const SYSTEM_INSTRUCTION: &str = "You are an expert mathematics educator who explains ideas visually, \
in the style of 3Blue1Brown. Produce a narrated animated lesson as a sequence of scenes. \
Each scene's manimScript must be valid Python for Manim Community Edition, indented with four spaces, \
using only classes that exist in that library. Do not use updaters, always_redraw or ValueTracker. \
Favour shapes, graphs, arrows, number lines and transformations over plain text, position text \
with to_edge, next_to or shift so nothing overlaps, and leave generous waits. \
Each scene lasts 30 to 50 seconds. Narration must fit the scene duration at roughly three words per \
second, start directly with the concept, and never mention scene numbers or use filler such as \
greetings or sign-offs.";

/// Gemini response schema for a lesson script
pub fn script_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "A concise, engaging title for the lesson video."
            },
            "explanation": {
                "type": "STRING",
                "description": "A conversational, step-by-step written explanation of the concept."
            },
            "scenes": {
                "type": "ARRAY",
                "description": "The animation scenes that make up the video, 12 to 18 for a 4-5 minute video.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "sceneNumber": { "type": "NUMBER", "description": "Sequential scene number starting at 1." },
                        "manimScript": { "type": "STRING", "description": "Manim code for this scene." },
                        "narration": { "type": "STRING", "description": "Voice-over text timed to the scene." },
                        "duration": { "type": "NUMBER", "description": "Estimated scene length in seconds." }
                    },
                    "required": ["sceneNumber", "manimScript", "narration", "duration"]
                }
            }
        },
        "required": ["title", "explanation", "scenes"]
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(deserialize_with = "scene_number")]
    pub scene_number: u32,
    #[serde(default)]
    pub manim_script: String,
    #[serde(default)]
    pub narration: String,
    #[serde(default, deserialize_with = "seconds")]
    pub duration: f64,
}

// Models sometimes emit numbers as strings
fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scene_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match lenient_number(&value) {
        Some(n) if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) => Ok(n.round() as u32),
        _ => Err(serde::de::Error::custom(format!("invalid sceneNumber {}", value))),
    }
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_number(&value).filter(|n| n.is_finite()).unwrap_or(0.0))
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    scenes: Vec<Scene>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutput {
    pub title: String,
    pub explanation: String,
    pub scenes: Vec<Scene>,
    pub full_manim_script: String,
    pub full_narration: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedScript {
    pub record: Script,
    pub output: ScriptOutput,
}

/// Parse the model's raw text and derive the concatenated script and narration
pub fn parse_script_response(raw: &str) -> Result<ScriptOutput, GenerationError> {
    let response: ScriptResponse =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| GenerationError::ScriptParse(e.to_string()))?;

    let mut scenes = response.scenes;
    if scenes.is_empty() {
        return Err(GenerationError::ScriptParse("response contained no scenes".to_string()));
    }
    scenes.sort_by_key(|scene| scene.scene_number);
    // Every scene is narrated; one fragment per scene
    if let Some(silent) = scenes.iter().find(|scene| scene.narration.trim().is_empty()) {
        return Err(GenerationError::ScriptParse(format!(
            "scene {} has no narration",
            silent.scene_number
        )));
    }

    let full_manim_script = scenes
        .iter()
        .map(|scene| format!("# Scene {}\n{}", scene.scene_number, scene.manim_script))
        .collect::<Vec<_>>()
        .join("\n\n");
    let full_narration = scenes
        .iter()
        .map(|scene| scene.narration.trim())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ScriptOutput {
        title: response.title,
        explanation: response.explanation,
        scenes,
        full_manim_script,
        full_narration,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.strip_prefix("json").unwrap_or(rest);
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}

#[derive(Clone)]
pub struct ScriptSynthesizer {
    store: Arc<dyn GenerationStore>,
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl ScriptSynthesizer {
    pub fn new(store: Arc<dyn GenerationStore>, model: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { store, model, retry }
    }

    pub async fn generate_script_for_prompt(&self, prompt: &Prompt) -> Result<GeneratedScript, GenerationError> {
        let request = ModelRequest {
            system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
            prompt: format!("Generate a video script for the topic: \"{}\"", prompt.prompt),
            response_schema: Some(script_schema()),
        };

        let raw = self
            .retry
            .run("script generation", || self.model.generate(&request))
            .await?
            .filter(|text| !text.trim().is_empty())
            .ok_or(GenerationError::EmptyModelResponse)?;

        let output = parse_script_response(&raw)?;
        let record = self
            .store
            .create_script(NewScript {
                script_id: generate_unique_id(),
                script: output.full_manim_script.clone(),
                narration: output.full_narration.clone(),
                explanation: output.explanation.clone(),
                prompt_record_id: prompt.id,
            })
            .await?;

        tracing::info!(
            prompt_id = %prompt.prompt_id,
            script_id = %record.script_id,
            scenes = output.scenes.len(),
            model = self.model.name(),
            "script generated"
        );
        Ok(GeneratedScript { record, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenes_are_concatenated_in_order() {
        let raw = r#"{
            "title": "Derivatives",
            "explanation": "Rates of change",
            "scenes": [
                {"sceneNumber": 2, "manimScript": "b()", "narration": " second ", "duration": 40},
                {"sceneNumber": "1", "manimScript": "a()", "narration": "first", "duration": "35"}
            ]
        }"#;
        let output = parse_script_response(raw).unwrap();

        assert_eq!(output.scenes[0].scene_number, 1);
        assert_eq!(output.scenes[0].duration, 35.0);
        assert_eq!(output.full_manim_script, "# Scene 1\na()\n\n# Scene 2\nb()");
        assert_eq!(output.full_narration, "first second");
    }

    #[test]
    fn fenced_json_is_accepted() {
        let raw = "```json\n{\"title\":\"t\",\"explanation\":\"e\",\"scenes\":[{\"sceneNumber\":1,\"manimScript\":\"x\",\"narration\":\"n\",\"duration\":30}]}\n```";
        assert_eq!(parse_script_response(raw).unwrap().scenes.len(), 1);
    }

    #[test]
    fn malformed_output_is_a_parse_failure() {
        assert!(matches!(parse_script_response("not json"), Err(GenerationError::ScriptParse(_))));
        assert!(matches!(
            parse_script_response(r#"{"title":"t","scenes":[]}"#),
            Err(GenerationError::ScriptParse(_))
        ));
    }

    #[test]
    fn scene_without_narration_is_a_parse_failure() {
        let raw = r#"{"title":"t","explanation":"e","scenes":[
            {"sceneNumber":1,"manimScript":"a()","narration":"first","duration":10},
            {"sceneNumber":2,"manimScript":"b()","narration":"   ","duration":10}
        ]}"#;
        let err = parse_script_response(raw).unwrap_err();
        assert!(matches!(err, GenerationError::ScriptParse(ref msg) if msg.contains("scene 2")));
    }

    #[test]
    fn output_serializes_in_camel_case() {
        let output = parse_script_response(
            r#"{"title":"t","explanation":"e","scenes":[{"sceneNumber":1,"manimScript":"x","narration":"n","duration":30}]}"#,
        )
        .unwrap();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["fullManimScript"], "# Scene 1\nx");
        assert_eq!(value["fullNarration"], "n");
        assert_eq!(value["scenes"][0]["sceneNumber"], 1);
    }
}
