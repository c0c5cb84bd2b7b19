// ABOUTME: Per-request classification of submitted identifiers.
// ABOUTME: Aggregates processed, skipped, failed, and warning entries into one serializable report.

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// Final classification of one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Processed,
    Failed,
}

/// Aggregated result of one submission. Failures are recorded here rather
/// than aborting the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, id: &Identifier, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Processed => self.processed.push(id.to_string()),
            JobOutcome::Failed => self.failed.push(id.to_string()),
        }
    }

    pub fn skip(&mut self, id: &Identifier) {
        self.skipped.push(id.to_string());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// True when nothing at all was classified or warned about.
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
            && self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_land_in_matching_lists() {
        let mut report = BatchReport::new();
        assert!(report.is_empty());

        let ok = Identifier::parse("C1").unwrap();
        let bad = Identifier::parse("C2").unwrap();
        let dup = Identifier::parse("C3").unwrap();
        report.record_outcome(&ok, JobOutcome::Processed);
        report.record_outcome(&bad, JobOutcome::Failed);
        report.skip(&dup);
        report.warn("ledger unreadable");

        assert_eq!(report.processed, vec!["C1"]);
        assert_eq!(report.failed, vec!["C2"]);
        assert_eq!(report.skipped, vec!["C3"]);
        assert_eq!(report.warnings, vec!["ledger unreadable"]);
        assert!(!report.is_empty());
    }

    #[test]
    fn serializes_with_all_four_keys() {
        let json = serde_json::to_value(BatchReport::new()).unwrap();
        for key in ["processed", "skipped", "failed", "warnings"] {
            assert!(json[key].is_array(), "missing {key}");
        }
    }
}
