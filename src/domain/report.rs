//! Per-run result reporting.
//!
//! The run always completes and reports a summary: every executed, skipped
//! or failed statement lands in an ordered log per destination, so the
//! operator is never left guessing which statements were applied.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Outcome of a single DDL statement at a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StatementOutcome {
    Executed,
    /// Generation downgraded the statement instead of running it.
    Skipped { reason: String },
    Failed { error: String },
}

/// One entry in the ordered statement log of a destination.
#[derive(Debug, Clone, Serialize)]
pub struct StatementLog {
    pub sql: String,
    pub outcome: StatementOutcome,
}

/// A recorded downgrade: the run continued, but something was not applied
/// exactly as the master defines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunWarning {
    /// An index could not fit under the key-length ceiling even at one
    /// character per text column and was dropped from the generated DDL.
    IndexSkipped {
        table: String,
        index: String,
        needed_bytes: u32,
        ceiling: u32,
    },
    /// The master collation was replaced by a fallback for the destination.
    CollationFallback {
        scope: String,
        from: String,
        to: String,
    },
    /// A table was skipped during data migration (absent on destination).
    TableSkipped { table: String, reason: String },
}

impl RunWarning {
    pub fn describe(&self) -> String {
        match self {
            RunWarning::IndexSkipped {
                table,
                index,
                needed_bytes,
                ceiling,
            } => format!(
                "index {index} on {table} needs {needed_bytes} bytes, ceiling is {ceiling}; index dropped"
            ),
            RunWarning::CollationFallback { scope, from, to } => {
                format!("{scope}: collation {from} replaced with {to}")
            }
            RunWarning::TableSkipped { table, reason } => {
                format!("table {table} skipped: {reason}")
            }
        }
    }
}

/// Terminal state of one destination's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DestinationStatus {
    Success,
    /// Completed, but at least one warning was recorded.
    CompletedWithWarnings,
    /// Aborted partway; the statement log shows exactly how far it got.
    Failed,
    /// Operator abort; no further statements were issued.
    Cancelled,
}

/// Everything that happened at one destination.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationReport {
    pub database: String,
    pub status: DestinationStatus,
    pub statements: Vec<StatementLog>,
    /// Rows migrated per table (data-only mode).
    pub rows_migrated: BTreeMap<String, u64>,
    /// Tables whose data copy failed; the rest of the run continued.
    pub table_errors: BTreeMap<String, String>,
    pub warnings: Vec<RunWarning>,
    /// Human-readable fatal error, when `status` is `Failed`.
    pub error: Option<String>,
}

impl DestinationReport {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            status: DestinationStatus::Success,
            statements: Vec::new(),
            rows_migrated: BTreeMap::new(),
            table_errors: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn record(&mut self, sql: impl Into<String>, outcome: StatementOutcome) {
        self.statements.push(StatementLog {
            sql: sql.into(),
            outcome,
        });
    }

    pub fn executed_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| s.outcome == StatementOutcome::Executed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.statements
            .iter()
            .filter(|s| matches!(s.outcome, StatementOutcome::Skipped { .. }))
            .count()
    }

    /// Settle the final status from what was recorded. A `Failed` or
    /// `Cancelled` status set explicitly is left alone; per-table errors
    /// make the destination failed even though later tables kept going.
    pub fn finish(&mut self) {
        if self.status != DestinationStatus::Success {
            return;
        }
        if !self.table_errors.is_empty() {
            self.status = DestinationStatus::Failed;
        } else if !self.warnings.is_empty() {
            self.status = DestinationStatus::CompletedWithWarnings;
        }
    }
}

/// Overall run status, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Success,
    CompletedWithWarnings,
    Failed,
}

impl RunStatus {
    /// 0 full success, 1 aborted with unrecoverable error, 2 completed
    /// with warnings.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::CompletedWithWarnings => 2,
        }
    }
}

/// Result of one synchronization run across all destinations.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub master_database: String,
    pub mode: String,
    pub started_at: String,
    pub finished_at: String,
    pub destinations: Vec<DestinationReport>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn new(master_database: &str, mode: &str, destinations: Vec<DestinationReport>) -> Self {
        let status = Self::aggregate(&destinations);
        RunReport {
            run_id: format!(
                "run_{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                Uuid::new_v4().simple()
            ),
            master_database: master_database.to_string(),
            mode: mode.to_string(),
            started_at: Utc::now().to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            destinations,
            status,
        }
    }

    fn aggregate(destinations: &[DestinationReport]) -> RunStatus {
        let any_failed = destinations.iter().any(|d| {
            matches!(
                d.status,
                DestinationStatus::Failed | DestinationStatus::Cancelled
            )
        });
        if any_failed {
            return RunStatus::Failed;
        }
        let any_warned = destinations
            .iter()
            .any(|d| d.status == DestinationStatus::CompletedWithWarnings);
        if any_warned {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Success
        }
    }

    pub fn total_rows_migrated(&self) -> u64 {
        self.destinations
            .iter()
            .flat_map(|d| d.rows_migrated.values())
            .sum()
    }

    pub fn total_warnings(&self) -> usize {
        self.destinations.iter().map(|d| d.warnings.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(status: DestinationStatus) -> DestinationReport {
        let mut d = DestinationReport::new("db");
        d.status = status;
        d
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
        assert_eq!(RunStatus::CompletedWithWarnings.exit_code(), 2);
    }

    #[test]
    fn failure_wins_over_warnings() {
        let report = RunReport::new(
            "master",
            "update",
            vec![
                dest(DestinationStatus::CompletedWithWarnings),
                dest(DestinationStatus::Failed),
            ],
        );
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn warnings_downgrade_success() {
        let report = RunReport::new(
            "master",
            "update",
            vec![
                dest(DestinationStatus::Success),
                dest(DestinationStatus::CompletedWithWarnings),
            ],
        );
        assert_eq!(report.status, RunStatus::CompletedWithWarnings);
    }

    #[test]
    fn cancelled_counts_as_failed_run() {
        let report = RunReport::new("master", "overwrite", vec![dest(DestinationStatus::Cancelled)]);
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn finish_promotes_warnings() {
        let mut d = DestinationReport::new("db");
        d.warnings.push(RunWarning::TableSkipped {
            table: "t".into(),
            reason: "absent".into(),
        });
        d.finish();
        assert_eq!(d.status, DestinationStatus::CompletedWithWarnings);
    }

    #[test]
    fn statement_counts() {
        let mut d = DestinationReport::new("db");
        d.record("CREATE TABLE `a` (`x` int)", StatementOutcome::Executed);
        d.record(
            "CREATE INDEX `i` ON `a` (`x`)",
            StatementOutcome::Skipped {
                reason: "infeasible".into(),
            },
        );
        assert_eq!(d.executed_count(), 1);
        assert_eq!(d.skipped_count(), 1);
    }
}
