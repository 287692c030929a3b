// Generation workflow: prompt -> script -> audio -> render job
pub mod generation;

pub use generation::{GenerationOutcome, GenerationRequest, GenerationWorkflow};
