// ABOUTME: Core library for partshelf, containing identifier rules, batch reports, and log fan-out.
// ABOUTME: This crate defines the shared data model used across all partshelf components.

pub mod broadcast;
pub mod identifier;
pub mod layer;
pub mod report;
pub mod submission;

pub use broadcast::{LogBroadcaster, LogEvent, LogSubscription, strip_ansi};
pub use identifier::{Identifier, ValidationError};
pub use layer::{BroadcastLayer, CONVERTER_OUTPUT_TARGET};
pub use report::{BatchReport, JobOutcome};
pub use submission::{SubmissionPlan, parse_csv_identifiers};
