// ABOUTME: Converter backend that shells out to the easyeda2kicad command-line tool.
// ABOUTME: Streams merged stdout/stderr line by line to the log channel and enforces an optional timeout.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tokio_stream::wrappers::LinesStream;

use partshelf_core::{Identifier, LogBroadcaster};

use crate::runtime::{ConverterError, ConverterExit, ConverterRuntime, forward_output_line};

/// Default executable name, resolved through `PATH`.
pub const DEFAULT_PROGRAM: &str = "easyeda2kicad";

/// Runs `easyeda2kicad --lcsc_id <ID> --full --output <prefix>`.
#[derive(Debug, Clone)]
pub struct Easyeda2Kicad {
    program: String,
    timeout: Option<Duration>,
}

impl Default for Easyeda2Kicad {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Easyeda2Kicad {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the process and fail the job when it runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command-line arguments for one identifier.
    pub fn args(id: &Identifier, output_prefix: &Path) -> Vec<OsString> {
        vec![
            "--lcsc_id".into(),
            id.as_str().into(),
            "--full".into(),
            "--output".into(),
            output_prefix.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl ConverterRuntime for Easyeda2Kicad {
    async fn convert(
        &self,
        id: &Identifier,
        output_prefix: &Path,
        log: &LogBroadcaster,
    ) -> Result<ConverterExit, ConverterError> {
        tracing::info!(
            "Running {} for {} using output prefix {}",
            self.program,
            id,
            output_prefix.display()
        );

        let mut child = Command::new(&self.program)
            .args(Self::args(id, output_prefix))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConverterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let lines = merged_output(&mut child)?;

        let status = match self.timeout {
            Some(limit) => {
                let waited = timeout(limit, pump(&mut child, lines, id, log)).await;
                let Ok(status) = waited else {
                    tracing::error!("{} for {} exceeded {:?}; killing it", self.program, id, limit);
                    if let Err(e) = child.kill().await {
                        tracing::warn!("could not kill converter process: {}", e);
                    }
                    return Err(ConverterError::TimedOut(limit));
                };
                status?
            }
            None => pump(&mut child, lines, id, log).await?,
        };

        tracing::debug!("{} for {} finished with {}", self.program, id, status);
        Ok(ConverterExit {
            code: status.code(),
        })
    }

    fn name(&self) -> &str {
        &self.program
    }
}

type LineStream = std::pin::Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// Interleave stdout and stderr lines in arrival order.
fn merged_output(child: &mut Child) -> Result<LineStream, ConverterError> {
    let missing = |name: &str| {
        ConverterError::Io(std::io::Error::other(format!("converter {name} was not captured")))
    };
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    let stdout = LinesStream::new(BufReader::new(stdout).lines());
    let stderr = LinesStream::new(BufReader::new(stderr).lines());
    Ok(Box::pin(stream::select(stdout, stderr)))
}

/// Forward every line until both pipes close, then reap the process.
async fn pump(
    child: &mut Child,
    mut lines: LineStream,
    id: &Identifier,
    log: &LogBroadcaster,
) -> Result<ExitStatus, ConverterError> {
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => forward_output_line(id, &line, log),
            // Undecodable output is dropped; the pipe keeps flowing
            Err(e) => tracing::warn!("[{}] unreadable converter output: {}", id, e),
        }
    }
    Ok(child.wait().await?)
}
