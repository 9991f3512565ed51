//! Run bookkeeping: the error ledger, phases and the final report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Errors shown in the printed summary before the rest are counted.
const SUMMARY_SAMPLE: usize = 5;

/// One recorded table- or row-scoped failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub table: Option<String>,
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "[{}] {}", table, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ordered list of non-fatal errors with an abort ceiling.
#[derive(Debug, Clone)]
pub struct ErrorLedger {
    errors: Vec<RunError>,
    max_errors: usize,
}

impl ErrorLedger {
    pub fn new(max_errors: usize) -> Self {
        Self {
            errors: Vec::new(),
            max_errors,
        }
    }

    pub fn record(&mut self, table: Option<&str>, message: impl Into<String>) {
        self.errors.push(RunError {
            table: table.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[RunError] {
        &self.errors
    }

    /// Errors recorded against `table`.
    pub fn count_for(&self, table: &str) -> usize {
        self.errors
            .iter()
            .filter(|e| e.table.as_deref() == Some(table))
            .count()
    }

    /// True once more errors than the ceiling have accumulated.
    pub fn exceeded(&self) -> bool {
        self.errors.len() > self.max_errors
    }

    /// `ErrorCeilingExceeded` when [`ErrorLedger::exceeded`].
    pub fn check(&self) -> Result<()> {
        if self.exceeded() {
            return Err(MigrateError::ErrorCeilingExceeded {
                count: self.errors.len(),
                max: self.max_errors,
            });
        }
        Ok(())
    }

    pub fn into_errors(self) -> Vec<RunError> {
        self.errors
    }
}

/// Stages of a data migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Connecting,
    SchemaSync,
    DisableFk,
    CopyFixedTables,
    CopyDynamicTables,
    RecomputeAggregates,
    ResetSequences,
    Report,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Connecting => "connecting",
            RunPhase::SchemaSync => "schema_sync",
            RunPhase::DisableFk => "disable_fk",
            RunPhase::CopyFixedTables => "copy_fixed_tables",
            RunPhase::CopyDynamicTables => "copy_dynamic_tables",
            RunPhase::RecomputeAggregates => "recompute_aggregates",
            RunPhase::ResetSequences => "reset_sequences",
            RunPhase::Report => "report",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// Per-table copy counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub errors: usize,
}

impl TableOutcome {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}

/// Result of a data migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub status: RunStatus,
    pub source: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub tables: Vec<TableOutcome>,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub errors: Vec<RunError>,
    /// Why the run stopped early, when aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl MigrationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Human-readable summary with up to five sample errors.
    pub fn summary(&self) -> String {
        let status = match self.status {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
        };
        let mut out = format!(
            "Migration {}: {} tables, {} rows written, {} skipped in {:.1}s\n",
            status,
            self.tables.len(),
            self.rows_written,
            self.rows_skipped,
            self.duration_seconds
        );
        if let Some(reason) = &self.abort_reason {
            out.push_str(&format!("Aborted: {}\n", reason));
        }
        if self.errors.is_empty() {
            out.push_str("No errors\n");
            return out;
        }

        out.push_str(&format!("{} errors:\n", self.errors.len()));
        for err in self.errors.iter().take(SUMMARY_SAMPLE) {
            out.push_str(&format!("  - {}\n", err));
        }
        if self.errors.len() > SUMMARY_SAMPLE {
            out.push_str(&format!(
                "  ... {} more omitted\n",
                self.errors.len() - SUMMARY_SAMPLE
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(errors: usize) -> MigrationReport {
        let now = Utc::now();
        MigrationReport {
            status: RunStatus::Completed,
            source: "sqlite:a.db".into(),
            target: "sqlite:b.db".into(),
            started_at: now,
            completed_at: now,
            duration_seconds: 1.25,
            tables: vec![TableOutcome::new("users")],
            rows_written: 10,
            rows_skipped: 0,
            errors: (0..errors)
                .map(|i| RunError {
                    table: Some("users".into()),
                    message: format!("row {i} failed"),
                })
                .collect(),
            abort_reason: None,
        }
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    #[test]
    fn test_ledger_ceiling_is_exclusive() {
        let mut ledger = ErrorLedger::new(2);
        ledger.record(Some("users"), "a");
        ledger.record(None, "b");
        assert!(!ledger.exceeded());
        assert!(ledger.check().is_ok());

        ledger.record(Some("users"), "c");
        assert!(ledger.exceeded());
        assert!(matches!(
            ledger.check(),
            Err(MigrateError::ErrorCeilingExceeded { count: 3, max: 2 })
        ));
        assert_eq!(ledger.count_for("users"), 2);
    }

    // =========================================================================
    // Report
    // =========================================================================

    #[test]
    fn test_summary_truncates_errors() {
        let summary = report(8).summary();
        assert!(summary.contains("8 errors:"));
        assert!(summary.contains("[users] row 4 failed"));
        assert!(!summary.contains("row 5 failed"));
        assert!(summary.contains("... 3 more omitted"));
    }

    #[test]
    fn test_summary_without_errors() {
        let summary = report(0).summary();
        assert!(summary.starts_with("Migration completed: 1 tables, 10 rows written"));
        assert!(summary.contains("No errors"));
    }

    #[test]
    fn test_report_json_uses_lowercase_status() {
        let json = report(1).to_json().unwrap();
        assert!(json.contains("\"status\": \"completed\""));
        assert!(!json.contains("abort_reason"));
    }
}
