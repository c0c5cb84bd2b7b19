// ABOUTME: Turns raw form input (a single ID and/or a CSV upload) into a processing plan.
// ABOUTME: Validates identifiers, drops already-processed ones, and collects user-facing warnings.

use crate::identifier::{Identifier, ValidationError};
use crate::report::BatchReport;

/// Name of the CSV column holding part numbers.
pub const LCSC_COLUMN: &str = "LCSC";

const UTF8_BOM: &str = "\u{feff}";

/// The identifiers a request will convert, plus the partially-filled report
/// (skips and validation warnings) that the orchestrator will complete.
#[derive(Debug, Default)]
pub struct SubmissionPlan {
    pub to_process: Vec<Identifier>,
    pub report: BatchReport,
}

impl SubmissionPlan {
    /// Build a plan from a single-identifier field and an optional CSV upload.
    ///
    /// `is_processed` answers ledger membership. Identifiers already in the
    /// ledger, or already queued earlier in the same submission, are skipped.
    pub fn build<F>(single: Option<&str>, csv: Option<&[u8]>, is_processed: F) -> Self
    where
        F: Fn(&Identifier) -> bool,
    {
        let mut plan = Self::default();
        let single = single.map(str::trim).filter(|s| !s.is_empty());

        if single.is_none() && csv.is_none() {
            plan.report.warn("No LCSC IDs provided.");
            return plan;
        }

        if let Some(raw) = single {
            plan.admit(raw, "", &is_processed);
        }

        if let Some(bytes) = csv {
            plan.admit_csv(bytes, &is_processed);
        }

        plan
    }

    fn admit_csv<F>(&mut self, bytes: &[u8], is_processed: &F)
    where
        F: Fn(&Identifier) -> bool,
    {
        let text = match std::str::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                tracing::error!("CSV upload is not valid UTF-8");
                self.report.warn(ValidationError::NotUtf8.to_string());
                return;
            }
        };

        let cells = match parse_csv_identifiers(text) {
            Ok(cells) => cells,
            Err(e) => {
                tracing::warn!("rejected CSV upload: {}", e);
                self.report.warn(e.to_string());
                return;
            }
        };

        let before = self.to_process.len() + self.report.skipped.len();
        for cell in &cells {
            self.admit(cell, " found in CSV", is_processed);
        }
        if self.to_process.len() + self.report.skipped.len() == before {
            self.report.warn("No valid or new LCSC IDs found in CSV file.");
        }
    }

    fn admit<F>(&mut self, raw: &str, origin: &str, is_processed: &F)
    where
        F: Fn(&Identifier) -> bool,
    {
        let id = match Identifier::parse(raw) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!("Invalid LCSC ID format{}: '{}'", origin, raw.trim());
                self.report
                    .warn(format!("Invalid LCSC ID format{}: '{}'", origin, raw.trim()));
                return;
            }
        };

        if is_processed(&id) || self.to_process.contains(&id) {
            tracing::info!("Skipping already processed LCSC ID: {}", id);
            self.report.skip(&id);
        } else {
            self.to_process.push(id);
        }
    }
}

/// Extract the non-empty `LCSC` column values from CSV text.
///
/// A leading UTF-8 BOM is ignored. Quoted fields may contain commas,
/// doubled quotes, and line breaks. Blank lines are skipped.
pub fn parse_csv_identifiers(text: &str) -> Result<Vec<String>, ValidationError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut records = split_records(text).into_iter();

    let header = records.next().ok_or(ValidationError::MissingColumn)?;
    let column = header
        .iter()
        .position(|h| h.trim() == LCSC_COLUMN)
        .ok_or(ValidationError::MissingColumn)?;

    Ok(records
        .filter_map(|record| record.into_iter().nth(column))
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect())
}

fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
                push_record(&mut records, std::mem::take(&mut fields));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        push_record(&mut records, fields);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, fields: Vec<String>) {
    let blank = fields.len() == 1 && fields[0].trim().is_empty();
    if !blank {
        records.push(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &Identifier) -> bool {
        false
    }

    #[test]
    fn csv_column_is_found_by_name() {
        let csv = "Designator,LCSC,Value\nR1,C25804,10k\nR2,,1k\nC1,\"C1525\",100n\n";
        assert_eq!(parse_csv_identifiers(csv).unwrap(), vec!["C25804", "C1525"]);
    }

    #[test]
    fn csv_tolerates_bom_and_quoted_commas() {
        let csv = "\u{feff}\"Comment, long\",LCSC\n\"a, b\",C9\n";
        assert_eq!(parse_csv_identifiers(csv).unwrap(), vec!["C9"]);
    }

    #[test]
    fn csv_quoted_line_breaks_stay_in_their_field() {
        let csv = "Comment,LCSC,Value\r\n\"two\nline\",C42,10k\r\n\r\nplain,C43,1k\r\n";
        assert_eq!(parse_csv_identifiers(csv).unwrap(), vec!["C42", "C43"]);
    }

    #[test]
    fn csv_without_column_is_rejected() {
        assert_eq!(
            parse_csv_identifiers("Designator,Value\nR1,10k\n"),
            Err(ValidationError::MissingColumn)
        );
        assert_eq!(parse_csv_identifiers(""), Err(ValidationError::MissingColumn));
    }

    #[test]
    fn empty_submission_warns() {
        let plan = SubmissionPlan::build(Some("   "), None, never);
        assert!(plan.to_process.is_empty());
        assert_eq!(plan.report.warnings, vec!["No LCSC IDs provided."]);
    }

    #[test]
    fn processed_ids_are_skipped() {
        let plan = SubmissionPlan::build(Some("C100"), None, |id| id.as_str() == "C100");
        assert!(plan.to_process.is_empty());
        assert_eq!(plan.report.skipped, vec!["C100"]);
    }

    #[test]
    fn single_and_csv_are_merged_and_deduplicated() {
        let csv = b"LCSC\nC1\nC2\nC1\nbad\n";
        let plan = SubmissionPlan::build(Some("C2"), Some(csv), never);

        let queued: Vec<&str> = plan.to_process.iter().map(Identifier::as_str).collect();
        assert_eq!(queued, vec!["C2", "C1"]);
        assert_eq!(plan.report.skipped, vec!["C2", "C1"]);
        assert_eq!(
            plan.report.warnings,
            vec!["Invalid LCSC ID format found in CSV: 'bad'"]
        );
    }

    #[test]
    fn invalid_single_id_is_a_warning() {
        let plan = SubmissionPlan::build(Some("12345"), None, never);
        assert!(plan.to_process.is_empty());
        assert_eq!(plan.report.warnings, vec!["Invalid LCSC ID format: '12345'"]);
    }

    #[test]
    fn csv_without_usable_rows_warns() {
        let plan = SubmissionPlan::build(None, Some(b"LCSC\n\n,\n"), never);
        assert_eq!(
            plan.report.warnings,
            vec!["No valid or new LCSC IDs found in CSV file."]
        );
    }

    #[test]
    fn non_utf8_csv_warns() {
        let plan = SubmissionPlan::build(None, Some(&[0xff, 0xfe, 0x00]), never);
        assert_eq!(plan.report.warnings, vec![ValidationError::NotUtf8.to_string()]);
    }
}
