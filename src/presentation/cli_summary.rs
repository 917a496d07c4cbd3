use crate::domain::report::{DestinationStatus, RunReport};
use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DestRow {
    destination: String,
    status: String,
    executed: String,
    skipped: String,
    rows: String,
    warnings: String,
}

pub fn print_summary(report: &RunReport) {
    println!();
    println!("{}", "SCHEMASYNC RUN SUMMARY".bold().cyan());
    println!(
        "{} → {} destination(s), mode: {}",
        report.master_database.blue(),
        report.destinations.len(),
        report.mode.bold()
    );
    println!("Run: {}", report.run_id.bright_yellow());
    println!();

    let rows: Vec<DestRow> = report
        .destinations
        .iter()
        .map(|d| DestRow {
            destination: d.database.bold().to_string(),
            status: status_cell(&d.status),
            executed: d.executed_count().to_string().green().to_string(),
            skipped: d.skipped_count().to_string().yellow().to_string(),
            rows: d
                .rows_migrated
                .values()
                .sum::<u64>()
                .to_string(),
            warnings: d.warnings.len().to_string().yellow().to_string(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=5)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    for dest in &report.destinations {
        for warning in &dest.warnings {
            println!(
                "  {} {}: {}",
                "warn".yellow(),
                dest.database,
                warning.describe()
            );
        }
        for (table_name, error) in &dest.table_errors {
            println!("  {} {}.{}: {}", "fail".red(), dest.database, table_name, error);
        }
        if let Some(error) = &dest.error {
            println!("  {} {}: {}", "fail".red(), dest.database, error);
        }
    }
    println!();
}

fn status_cell(status: &DestinationStatus) -> String {
    match status {
        DestinationStatus::Success => "ok".green().to_string(),
        DestinationStatus::CompletedWithWarnings => "warnings".yellow().to_string(),
        DestinationStatus::Failed => "failed".red().to_string(),
        DestinationStatus::Cancelled => "cancelled".red().to_string(),
    }
}
