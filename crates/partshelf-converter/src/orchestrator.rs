// ABOUTME: Runs accepted identifiers through the converter one at a time and folds results into a library.
// ABOUTME: Coordinates temp prefixes, the file organizer, and the ledger, and classifies each job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ulid::Ulid;

use partshelf_core::{BatchReport, Identifier, JobOutcome, LogBroadcaster};
use partshelf_store::organizer::remove_sources;
use partshelf_store::{ArtifactPaths, Ledger, LibraryInstance, OrganizeReport, organize};

use crate::runtime::{ConverterError, ConverterRuntime};

/// One identifier's trip through the converter. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub identifier: Identifier,
    pub temp_prefix: PathBuf,
    pub outcome: JobOutcome,
    /// Non-fatal problems to surface in the batch report.
    pub warnings: Vec<String>,
}

/// Reasons a job ended early. Each one fails the job; none aborts the batch.
#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("could not create temporary output directory: {0}")]
    Prepare(std::io::Error),

    #[error(transparent)]
    Converter(#[from] ConverterError),

    #[error("file organization task failed: {0}")]
    Organizer(tokio::task::JoinError),
}

/// Drives conversion jobs. Cheap to share behind an `Arc`; holds no
/// per-request state.
pub struct Orchestrator {
    converter: Arc<dyn ConverterRuntime>,
    temp_root: PathBuf,
    log: LogBroadcaster,
}

impl Orchestrator {
    pub fn new(converter: Arc<dyn ConverterRuntime>, temp_root: PathBuf, log: LogBroadcaster) -> Self {
        Self {
            converter,
            temp_root,
            log,
        }
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    /// A fresh, unique output prefix for one job.
    pub fn temp_prefix(&self, id: &Identifier) -> PathBuf {
        self.temp_root.join(format!("temp_{}_{}", id, Ulid::new()))
    }

    /// Convert `ids` strictly in order into `instance`, recording outcomes
    /// and warnings in `report`. The caller holds the instance lock.
    pub async fn run_batch(
        &self,
        ids: &[Identifier],
        instance: &LibraryInstance,
        ledger: &mut Ledger,
        report: &mut BatchReport,
    ) {
        if ids.is_empty() {
            return;
        }
        tracing::info!(
            "Processing {} new LCSC IDs into library folder '{}'",
            ids.len(),
            instance.name
        );
        self.log.publish(format!(
            "Starting conversion for {} new LCSC IDs into library '{}'...",
            ids.len(),
            instance.name
        ));

        for id in ids {
            let job = self.convert_one(id, instance, ledger).await;
            report.record_outcome(&job.identifier, job.outcome);
            for warning in job.warnings {
                report.warn(warning);
            }
        }
    }

    /// Run one identifier end to end. Temp artifacts are removed whatever
    /// the outcome.
    pub async fn convert_one(
        &self,
        id: &Identifier,
        instance: &LibraryInstance,
        ledger: &mut Ledger,
    ) -> ConversionJob {
        let mut job = ConversionJob {
            identifier: id.clone(),
            temp_prefix: self.temp_prefix(id),
            outcome: JobOutcome::Failed,
            warnings: Vec::new(),
        };

        match self.attempt(&mut job, instance, ledger).await {
            Ok(outcome) => job.outcome = outcome,
            Err(e) => {
                tracing::error!("Exception during processing of {}: {}", id, e);
                self.log
                    .publish(format!("[ERROR] Exception during processing of {id}: {e}"));
            }
        }

        self.remove_leftovers(&job.temp_prefix).await;
        job
    }

    async fn attempt(
        &self,
        job: &mut ConversionJob,
        instance: &LibraryInstance,
        ledger: &mut Ledger,
    ) -> Result<JobOutcome, JobError> {
        let id = &job.identifier;
        tokio::fs::create_dir_all(&job.temp_prefix)
            .await
            .map_err(JobError::Prepare)?;

        self.log.publish(format!("Converting {id}..."));
        let exit = self
            .converter
            .convert(id, &job.temp_prefix, &self.log)
            .await?;

        if !exit.is_success() {
            let code = exit
                .code
                .map_or_else(|| "none (killed by signal)".to_owned(), |c| c.to_string());
            let message = format!("Conversion failed for {id} with exit code {code}");
            tracing::error!("{}", message);
            self.log.publish(format!("[ERROR] {message}"));
            // Organize anyway so partial output is cleaned up the same way
            self.organize(&job.temp_prefix, &instance.root_path).await?;
            return Ok(JobOutcome::Failed);
        }

        tracing::info!("Successfully converted {}. Organizing files...", id);
        self.log
            .publish(format!("Conversion successful for {id}. Organizing..."));
        let organized = self.organize(&job.temp_prefix, &instance.root_path).await?;
        if !organized.is_success() {
            tracing::error!("File organization failed for {}.", id);
            self.log
                .publish(format!("[ERROR] File organization failed for {id}."));
            return Ok(JobOutcome::Failed);
        }

        match ledger.record(id.as_str()) {
            Ok(()) => {
                tracing::info!(
                    "Successfully processed and logged LCSC ID: {} to {}",
                    id,
                    ledger.path().display()
                );
                self.log.publish(format!(
                    "Successfully added {id} to library '{}'.",
                    instance.name
                ));
            }
            Err(e) => {
                tracing::error!("{}", e);
                job.warnings.push(format!(
                    "Could not update processed IDs log for '{}'.",
                    instance.name
                ));
            }
        }
        Ok(JobOutcome::Processed)
    }

    async fn organize(&self, prefix: &Path, library_dir: &Path) -> Result<OrganizeReport, JobError> {
        let prefix = prefix.to_path_buf();
        let library_dir = library_dir.to_path_buf();
        tokio::task::spawn_blocking(move || organize(&prefix, &library_dir))
            .await
            .map_err(JobError::Organizer)
    }

    async fn remove_leftovers(&self, prefix: &Path) {
        let prefix = prefix.to_path_buf();
        let cleanup = tokio::task::spawn_blocking(move || {
            let leftovers = ArtifactPaths::from_prefix(&prefix).existing();
            (!leftovers.is_empty()).then(|| remove_sources(&leftovers))
        })
        .await;

        match cleanup {
            Ok(Some(report)) if !report.errors.is_empty() => {
                tracing::error!("Error cleaning up temporary items: {}", report.errors.join("; "));
            }
            Ok(Some(report)) => {
                tracing::debug!("Cleaned up {} leftover temporary items", report.removed);
            }
            Ok(None) => {}
            Err(e) => tracing::error!("temporary cleanup task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easyeda::Easyeda2Kicad;
    use crate::testing::{Script, ScriptedConverter};
    use partshelf_store::layout::ledger_path;
    use partshelf_store::resolve_active;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        temp_root: PathBuf,
        instance: LibraryInstance,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let temp_root = dir.path().join("temp");
        let instance =
            resolve_active(&dir.path().join("library"), "easyeda_lib", "easyeda_lib_default").unwrap();
        Fixture {
            _dir: dir,
            temp_root,
            instance,
        }
    }

    fn orchestrator(converter: Arc<dyn ConverterRuntime>, fx: &Fixture, log: &LogBroadcaster) -> Orchestrator {
        Orchestrator::new(converter, fx.temp_root.clone(), log.clone())
    }

    fn ledger(fx: &Fixture) -> Ledger {
        Ledger::load(&ledger_path(&fx.instance.root_path)).unwrap()
    }

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    fn temp_is_empty(fx: &Fixture) -> bool {
        fs::read_dir(&fx.temp_root)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn successful_job_lands_in_library_and_ledger() {
        let fx = fixture();
        let log = LogBroadcaster::default();
        let orch = orchestrator(Arc::new(ScriptedConverter::default()), &fx, &log);
        let mut ledger = ledger(&fx);

        let job = orch.convert_one(&id("C123456"), &fx.instance, &mut ledger).await;

        assert_eq!(job.outcome, JobOutcome::Processed);
        assert!(job.warnings.is_empty());
        assert!(ledger.contains("C123456"));
        assert!(Ledger::load(ledger.path()).unwrap().contains("C123456"));

        let lib = &fx.instance.root_path;
        assert_eq!(fs::read_dir(lib.join("symbols")).unwrap().count(), 1);
        assert!(lib.join("footprints").join("R0603.kicad_mod").is_file());
        assert!(lib.join("3dshapes").join("R0603.step").is_file());
        assert!(temp_is_empty(&fx));
    }

    #[tokio::test]
    async fn nonzero_exit_fails_and_cleans_up() {
        let fx = fixture();
        let converter = ScriptedConverter::new(Script::failing(1).with_symbol().with_footprints(&["SOT23"]));
        let orch = orchestrator(Arc::new(converter), &fx, &LogBroadcaster::default());
        let mut ledger = ledger(&fx);

        let job = orch.convert_one(&id("C999999"), &fx.instance, &mut ledger).await;

        assert_eq!(job.outcome, JobOutcome::Failed);
        assert!(!ledger.contains("C999999"));
        assert!(!ledger.path().exists());
        assert!(temp_is_empty(&fx));
        assert!(!ArtifactPaths::from_prefix(&job.temp_prefix).symbol.exists());
    }

    #[tokio::test]
    async fn organizer_failure_fails_without_recording() {
        let fx = fixture();
        // A file where the symbols directory belongs makes ensure-dirs fail
        fs::write(fx.instance.root_path.join("symbols"), "blocker").unwrap();
        let orch = orchestrator(Arc::new(ScriptedConverter::default()), &fx, &LogBroadcaster::default());
        let mut ledger = ledger(&fx);

        let job = orch.convert_one(&id("C1"), &fx.instance, &mut ledger).await;

        assert_eq!(job.outcome, JobOutcome::Failed);
        assert!(!ledger.contains("C1"));
        assert!(temp_is_empty(&fx));
    }

    #[tokio::test]
    async fn spawn_failure_is_a_failed_job() {
        let fx = fixture();
        let log = LogBroadcaster::new(64);
        let mut sub = log.subscribe();
        let converter = Easyeda2Kicad::new("/nonexistent/partshelf-no-such-converter");
        let orch = orchestrator(Arc::new(converter), &fx, &log);
        let mut ledger = ledger(&fx);

        let job = orch.convert_one(&id("C7"), &fx.instance, &mut ledger).await;

        assert_eq!(job.outcome, JobOutcome::Failed);
        assert!(temp_is_empty(&fx));
        let lines: Vec<String> = sub.drain().into_iter().map(|e| e.text).collect();
        assert!(
            lines
                .iter()
                .any(|l| l.starts_with("[ERROR] Exception during processing of C7"))
        );
    }

    #[tokio::test]
    async fn ledger_write_failure_is_a_warning_not_a_failure() {
        let fx = fixture();
        let ledger_file = ledger_path(&fx.instance.root_path);
        // A directory at the ledger path cannot be opened for append
        fs::create_dir_all(&ledger_file).unwrap();
        let (mut ledger, _) = Ledger::load_or_empty(&ledger_file);
        let orch = orchestrator(Arc::new(ScriptedConverter::default()), &fx, &LogBroadcaster::default());

        let job = orch.convert_one(&id("C42"), &fx.instance, &mut ledger).await;

        assert_eq!(job.outcome, JobOutcome::Processed);
        assert_eq!(
            job.warnings,
            vec!["Could not update processed IDs log for 'easyeda_lib_default'.".to_string()]
        );
        assert!(ledger.contains("C42"));
    }

    #[tokio::test]
    async fn batch_runs_in_order_and_reports_each_outcome() {
        let fx = fixture();
        let log = LogBroadcaster::new(256);
        let mut sub = log.subscribe();
        let converter = Arc::new(ScriptedConverter::default().with_script("C2", Script::failing(1)));
        let orch = orchestrator(converter.clone(), &fx, &log);
        let mut ledger = ledger(&fx);
        let mut report = BatchReport::new();

        orch.run_batch(&[id("C1"), id("C2"), id("C3")], &fx.instance, &mut ledger, &mut report)
            .await;

        assert_eq!(converter.calls(), vec!["C1", "C2", "C3"]);
        assert_eq!(report.processed, vec!["C1", "C3"]);
        assert_eq!(report.failed, vec!["C2"]);

        let lines: Vec<String> = sub.drain().into_iter().map(|e| e.text).collect();
        assert_eq!(
            lines.first().map(String::as_str),
            Some("Starting conversion for 3 new LCSC IDs into library 'easyeda_lib_default'...")
        );
        assert!(lines.contains(&"Converting C2...".to_string()));
        assert!(lines.contains(&"[ERROR] Conversion failed for C2 with exit code 1".to_string()));
        assert!(lines.contains(&"Successfully added C3 to library 'easyeda_lib_default'.".to_string()));
    }

    #[test]
    fn temp_prefixes_are_unique() {
        let orch = Orchestrator::new(
            Arc::new(ScriptedConverter::default()),
            PathBuf::from("/out/temp"),
            LogBroadcaster::default(),
        );
        let a = orch.temp_prefix(&id("C5"));
        let b = orch.temp_prefix(&id("C5"));
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("temp_C5_"));
    }
}
