// ABOUTME: The shared submit flow behind the web form and the JSON convert endpoint.
// ABOUTME: Locks the active instance, loads its ledger, plans the batch, and runs the orchestrator.

use serde::Serialize;
use thiserror::Error;

use partshelf_core::{BatchReport, SubmissionPlan};
use partshelf_store::layout::ledger_path;
use partshelf_store::{Ledger, LibraryInstance, SelectorError};

use crate::app_state::{AppState, SharedState};

/// Raw user input for one submission.
#[derive(Debug, Default, Clone)]
pub struct SubmissionInput {
    pub lcsc_id: Option<String>,
    pub csv: Option<Vec<u8>>,
}

/// What the user gets back.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub library: String,
    #[serde(flatten)]
    pub report: BatchReport,
}

/// Errors that make the whole request fail rather than a single identifier.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Cannot create or access the library: {0}")]
    Library(#[from] SelectorError),

    #[error("Conversion task ended unexpectedly: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Run one submission against the active library instance. The ledger
/// check and every conversion happen under that instance's lock.
///
/// The batch runs on its own task. Dropping the returned future when a
/// client disconnects detaches the batch instead of cancelling it.
pub async fn run_submission(
    state: &SharedState,
    input: SubmissionInput,
) -> Result<SubmissionOutcome, SubmissionError> {
    let state = state.clone();
    tokio::spawn(async move { process_submission(&state, input).await }).await?
}

async fn process_submission(
    state: &AppState,
    input: SubmissionInput,
) -> Result<SubmissionOutcome, SubmissionError> {
    state.reload_settings();
    let instance = state.active_library()?;
    let _guard = state.locks.acquire(&instance.root_path).await;

    let (mut ledger, ledger_warning) = load_ledger(&instance);
    let plan = SubmissionPlan::build(input.lcsc_id.as_deref(), input.csv.as_deref(), |id| {
        ledger.contains(id.as_str())
    });

    let mut report = BatchReport::new();
    if let Some(warning) = ledger_warning {
        report.warn(warning);
    }
    report.skipped.extend(plan.report.skipped);
    report.warnings.extend(plan.report.warnings);

    state
        .orchestrator
        .run_batch(&plan.to_process, &instance, &mut ledger, &mut report)
        .await;

    Ok(SubmissionOutcome {
        library: instance.name,
        report,
    })
}

fn load_ledger(instance: &LibraryInstance) -> (Ledger, Option<String>) {
    let (ledger, err) = Ledger::load_or_empty(&ledger_path(&instance.root_path));
    match err {
        Some(_) => (
            ledger,
            Some(format!(
                "Could not read processed IDs log for library '{}'. Duplicate checks might be unreliable.",
                instance.name
            )),
        ),
        None => {
            tracing::info!(
                "Read {} processed IDs from {} for library '{}'",
                ledger.len(),
                ledger.path().display(),
                instance.name
            );
            (ledger, None)
        }
    }
}
