// ABOUTME: HTTP server for partshelf, providing the web page, JSON API, downloads, and SSE log streaming.
// ABOUTME: Uses Axum with shared state holding the orchestrator, instance locks, and the log channel.

pub mod api;
pub mod app_state;
pub mod config;
pub mod routes;
pub mod settings;
pub mod submission;
pub mod web;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, ServerConfig};
pub use routes::create_router;
pub use settings::{RuntimeSettings, SettingsError};
pub use submission::{SubmissionError, SubmissionInput, SubmissionOutcome, run_submission};
