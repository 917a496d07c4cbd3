use crate::domain::{ports::ReportWriter, report::RunReport};
use anyhow::Result;
use std::fs;

use self::{json::JsonWriter, sql::SqlWriter};

pub mod json;
pub mod sql;

pub fn writer_for(format: &str) -> Option<Box<dyn ReportWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "sql" => Some(Box::new(SqlWriter)),
        _ => None,
    }
}

/// Writes the run report to disk via the chosen writer
pub fn write_to_file(writer: &dyn ReportWriter, report: &RunReport, dir: &str) -> Result<()> {
    // Ensure the output directory exists
    fs::create_dir_all(dir)?;

    let content = writer.format(report)?;
    let path = format!("{}/{}.{}", dir, report.run_id, writer.extension());
    fs::write(&path, &content)?;
    Ok(())
}
