// ABOUTME: Background retention task that deletes library files older than the retention window.
// ABOUTME: Driven by a timer, reconfigured through a watch channel, and stopped with a cancellation token.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default pause between sweep passes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Pause before re-checking when the library root does not exist yet.
pub const MISSING_ROOT_RETRY: Duration = DAY;

/// Whether and how aggressively old library files are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub enabled: bool,
    pub window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_days(true, 7)
    }
}

impl RetentionPolicy {
    pub fn from_days(enabled: bool, days: u64) -> Self {
        Self {
            enabled,
            window: DAY.saturating_mul(days.min(u32::MAX as u64) as u32),
        }
    }

    /// Files last modified before this instant are eligible for deletion.
    /// Never earlier than the Unix epoch.
    pub fn cutoff(&self, now: SystemTime) -> SystemTime {
        now.checked_sub(self.window)
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .max(SystemTime::UNIX_EPOCH)
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub errors: usize,
}

/// Walk every file under `root` and delete those modified before `cutoff`.
/// Per-file problems are logged and skipped.
pub fn sweep_once(root: &Path, cutoff: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cleanup: could not read entry under {}: {}", root.display(), e);
                report.errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                tracing::error!("Cleanup error processing file {}: {}", path.display(), e);
                report.errors += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Cleanup: file vanished during iteration: {} ({})", path.display(), e);
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(path) {
            Ok(()) => {
                let shown = path.strip_prefix(root).unwrap_or(path);
                tracing::info!("Cleaned up file: {}", shown.display());
                report.removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Cleanup: File not found during iteration: {}", path.display());
            }
            Err(e) => {
                tracing::error!("Cleanup error processing file {}: {}", path.display(), e);
                report.errors += 1;
            }
        }
    }

    report
}

/// The retention task before it is started.
pub struct Sweeper {
    root: PathBuf,
    policy: watch::Receiver<RetentionPolicy>,
    interval: Duration,
    missing_root_retry: Duration,
}

impl Sweeper {
    pub fn new(root: PathBuf, policy: watch::Receiver<RetentionPolicy>) -> Self {
        Self {
            root,
            policy,
            interval: DEFAULT_SWEEP_INTERVAL,
            missing_root_retry: MISSING_ROOT_RETRY,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_missing_root_retry(mut self, retry: Duration) -> Self {
        self.missing_root_retry = retry;
        self
    }

    /// Start the loop on the tokio runtime. It runs until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> SweeperHandle {
        let task = tokio::spawn(self.run(cancel.clone()));
        SweeperHandle { cancel, task }
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut policy_open = true;

        loop {
            let policy = *self.policy.borrow_and_update();
            let wait = if !policy.enabled {
                tracing::info!("Cleanup is disabled. Waiting for a configuration change.");
                None
            } else if !self.root.exists() {
                tracing::info!(
                    "Cleanup: Library root {} does not exist. Sleeping.",
                    self.root.display()
                );
                Some(self.missing_root_retry)
            } else {
                self.pass(policy).await;
                Some(self.interval)
            };

            let deadline = wait.map(|d| Instant::now() + d);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("retention sweeper stopped");
                        return;
                    }
                    changed = self.policy.changed(), if policy_open => match changed {
                        Ok(()) => break,
                        Err(_) => policy_open = false,
                    },
                    _ = sleep_until(deadline) => break,
                }
            }
        }
    }

    async fn pass(&self, policy: RetentionPolicy) {
        let cutoff = policy.cutoff(SystemTime::now());
        tracing::info!(
            "Starting cleanup for files older than {} in {}",
            DateTime::<Local>::from(cutoff).format("%Y-%m-%d %H:%M:%S"),
            self.root.display()
        );

        let root = self.root.clone();
        match tokio::task::spawn_blocking(move || sweep_once(&root, cutoff)).await {
            Ok(report) => tracing::info!(
                "Cleanup finished. Removed {} old files.",
                report.removed.len()
            ),
            Err(e) => tracing::error!("General cleanup task error: {}", e),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A running sweeper. Dropping the handle leaves the task running; call
/// [`SweeperHandle::shutdown`] to stop it.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal cancellation and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("retention sweeper task ended abnormally: {}", e);
        }
    }
}
