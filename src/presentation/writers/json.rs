use anyhow::Result;

use crate::domain::ports::ReportWriter;
use crate::domain::report::RunReport;

pub struct JsonWriter;

impl ReportWriter for JsonWriter {
    fn format(&self, report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::DestinationReport;

    #[test]
    fn report_serializes_to_json() {
        let report = RunReport::new("master", "update", vec![DestinationReport::new("dst")]);
        let out = JsonWriter.format(&report).unwrap();
        assert!(out.contains("\"master_database\": \"master\""));
        assert!(out.contains("\"mode\": \"update\""));
        assert!(out.contains("\"dst\""));
    }
}
