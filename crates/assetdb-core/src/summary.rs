use std::fmt::Write as _;

use comfy_table::{presets::ASCII_FULL, Table};
use serde::Serialize;

use crate::ingestion::{RowFailure, RowOutcome};

const RULE: &str = "============================================================";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Resolution,
    Read,
    Upload,
    Malformed,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedRow {
    pub row: usize,
    pub reference_name: String,
    pub file_name: String,
    pub asset_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRow {
    pub row: usize,
    pub reference_name: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one import run. `total == successful + failed` always holds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub uploads: Vec<UploadedRow>,
    pub failures: Vec<FailedRow>,
}

impl ImportReport {
    /// `None` when no rows were processed.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.successful as f64 / self.total as f64)
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "IMPORT SUMMARY");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Total rows: {}", self.total);
        let _ = writeln!(out, "Successful: {}", self.successful);
        let _ = writeln!(out, "Failed: {}", self.failed);
        match self.success_rate() {
            Some(rate) => {
                let _ = writeln!(out, "Success rate: {:.1}%", rate * 100.0);
            }
            None => {
                let _ = writeln!(out, "Success rate: n/a (no rows processed)");
            }
        }

        if !self.failures.is_empty() {
            let mut table = Table::new();
            table
                .load_preset(ASCII_FULL)
                .set_header(vec!["Row", "Reference", "Kind", "Reason"]);
            for failure in &self.failures {
                table.add_row(vec![
                    failure.row.to_string(),
                    failure.reference_name.clone(),
                    failure_kind_label(failure.kind).to_string(),
                    failure.reason.clone(),
                ]);
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "Failures:");
            let _ = writeln!(out, "{table}");
        }

        let _ = write!(out, "{RULE}");
        out
    }
}

fn failure_kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Resolution => "resolution",
        FailureKind::Read => "read",
        FailureKind::Upload => "upload",
        FailureKind::Malformed => "malformed",
    }
}

/// Accumulates per-row outcomes in encounter order.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: ImportReport,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, row: usize, reference_name: &str, outcome: RowOutcome) {
        self.report.total += 1;
        match outcome {
            RowOutcome::Uploaded { file_name, asset } => {
                self.report.successful += 1;
                self.report.uploads.push(UploadedRow {
                    row,
                    reference_name: reference_name.to_string(),
                    file_name,
                    asset_id: asset.id,
                    storage_location: asset.storage_location,
                });
            }
            RowOutcome::Failed(failure) => {
                self.report.failed += 1;
                self.report.failures.push(FailedRow {
                    row,
                    reference_name: reference_name.to_string(),
                    kind: classify(&failure),
                    reason: failure.to_string(),
                });
            }
        }
    }

    pub fn finish(self) -> ImportReport {
        self.report
    }
}

fn classify(failure: &RowFailure) -> FailureKind {
    match failure {
        RowFailure::Resolution(_) => FailureKind::Resolution,
        RowFailure::Read { .. } => FailureKind::Read,
        RowFailure::Upload(_) => FailureKind::Upload,
        RowFailure::Malformed(_) => FailureKind::Malformed,
    }
}
