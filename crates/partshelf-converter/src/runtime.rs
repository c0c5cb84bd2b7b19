// ABOUTME: Defines the ConverterRuntime trait that every converter backend implements.
// ABOUTME: Also defines ConverterExit (how the tool finished) and ConverterError (why it could not run).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use partshelf_core::{CONVERTER_OUTPUT_TARGET, Identifier, LogBroadcaster, strip_ansi};

/// How a converter invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterExit {
    /// Process exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl ConverterExit {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Failures that prevented the converter from running to completion.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("could not start converter '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("converter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("converter timed out after {0:?}")]
    TimedOut(Duration),
}

/// Trait that all converter backends implement. A backend turns one
/// identifier into artifacts written next to `output_prefix`
/// (`<prefix>.kicad_sym`, `<prefix>.pretty/`, `<prefix>.3dshapes/`) and
/// forwards its console output to the log channel as it runs.
#[async_trait]
pub trait ConverterRuntime: Send + Sync {
    async fn convert(
        &self,
        id: &Identifier,
        output_prefix: &Path,
        log: &LogBroadcaster,
    ) -> Result<ConverterExit, ConverterError>;

    /// Backend name for logging (e.g. "easyeda2kicad").
    fn name(&self) -> &str;
}

/// Forward one console line from the converter: to live viewers as
/// `[<ID>] <line>` and to the durable process log. Blank lines are dropped.
pub fn forward_output_line(id: &Identifier, line: &str, log: &LogBroadcaster) {
    let clean = strip_ansi(line);
    let clean = clean.trim();
    if clean.is_empty() {
        return;
    }
    tracing::info!(target: CONVERTER_OUTPUT_TARGET, "[{}] {}", id, clean);
    log.publish(format!("[{id}] {clean}"));
}
