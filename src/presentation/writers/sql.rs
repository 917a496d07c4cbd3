use std::fmt::Write as FmtWrite;

use anyhow::Result;

use crate::application::generator::GeneratedDdl;
use crate::domain::ports::ReportWriter;
use crate::domain::report::{RunReport, StatementOutcome};

pub struct SqlWriter;

impl ReportWriter for SqlWriter {
    /// Replayable script of what actually ran: executed statements as-is,
    /// skipped and failed ones as comments.
    fn format(&self, report: &RunReport) -> Result<String> {
        let mut sql = String::new();
        writeln!(sql, "-- Run: {}", report.run_id)?;
        writeln!(sql, "-- Master: {}", report.master_database)?;
        writeln!(sql, "-- Mode: {}", report.mode)?;
        writeln!(sql, "-- Generated: {}", report.started_at)?;
        writeln!(sql)?;

        for dest in &report.destinations {
            writeln!(sql, "-- ============================================")?;
            writeln!(sql, "-- Destination: {}", dest.database)?;
            writeln!(sql, "-- ============================================")?;
            writeln!(sql)?;
            for stmt in &dest.statements {
                match &stmt.outcome {
                    StatementOutcome::Executed => writeln!(sql, "{};", stmt.sql)?,
                    StatementOutcome::Skipped { reason } => {
                        writeln!(sql, "-- skipped ({}): {}", reason, stmt.sql)?
                    }
                    StatementOutcome::Failed { error } => {
                        writeln!(sql, "-- FAILED ({}): {}", error, stmt.sql)?
                    }
                }
            }
            writeln!(sql)?;
        }
        Ok(sql)
    }

    fn extension(&self) -> &'static str {
        "sql"
    }
}

/// Dry-run rendering: the statements each destination would receive.
pub fn format_plan(plans: &[(String, GeneratedDdl)]) -> String {
    let mut sql = String::new();
    for (database, generated) in plans {
        let _ = writeln!(sql, "-- ============================================");
        let _ = writeln!(sql, "-- Destination: {database}");
        let _ = writeln!(sql, "-- ============================================");
        for stmt in &generated.statements {
            match &stmt.skip {
                None => {
                    let _ = writeln!(sql, "{};", stmt.sql);
                }
                Some(reason) => {
                    let _ = writeln!(sql, "-- skipped ({reason}): {}", stmt.sql);
                }
            }
        }
        for warning in &generated.warnings {
            let _ = writeln!(sql, "-- warning: {}", warning.describe());
        }
        let _ = writeln!(sql);
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::DestinationReport;

    #[test]
    fn executed_and_skipped_statements_render_differently() {
        let mut dest = DestinationReport::new("dst");
        dest.record("CREATE TABLE `dst`.`t` (`id` int NULL)", StatementOutcome::Executed);
        dest.record(
            "CREATE INDEX `wide` ON `dst`.`t` (`v`)",
            StatementOutcome::Skipped {
                reason: "index exceeds key-length ceiling".into(),
            },
        );
        let report = RunReport::new("master", "overwrite", vec![dest]);
        let out = SqlWriter.format(&report).unwrap();
        assert!(out.contains("CREATE TABLE `dst`.`t` (`id` int NULL);"));
        assert!(out.contains("-- skipped (index exceeds key-length ceiling)"));
    }
}
