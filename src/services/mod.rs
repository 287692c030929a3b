// src/services/mod.rs
pub mod audio_synthesis;
pub mod mux;
pub mod prompt_intake;
pub mod script_synthesis;
pub mod translation;

pub use audio_synthesis::{AudioStrategy, AudioSynthesizer, GeneratedAudio};
pub use mux::{MuxOutcome, MuxOverrides, MuxService};
pub use prompt_intake::PromptIntake;
pub use script_synthesis::{GeneratedScript, Scene, ScriptOutput, ScriptSynthesizer};
pub use translation::Translator;
