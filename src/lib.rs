// lib.rs - Library root for the lesson generation service
pub mod audio;
pub mod config;
pub mod db;
pub mod elevenlabs_client;
pub mod error;
pub mod gemini_client;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod render_client;
pub mod retry;
pub mod services;
pub mod state;
pub mod storage_client;
pub mod store;
pub mod utils;
pub mod workflow;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::GenerationError;
pub use handlers::build_router;
pub use jobs::JobStatus;
pub use retry::RetryPolicy;
pub use state::{AppState, Clients};
pub use store::{GenerationStore, MemoryStore, PgStore};
