//! Per-destination synchronization pipeline.
//!
//! One worker task per destination; the master snapshot is introspected
//! once and shared read-only. Destinations are independent: a failure in
//! one never stops another, and within one destination DDL executes
//! strictly in the order the generator produced.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::application::differ::SchemaDiffer;
use crate::application::generator::{DdlGenerator, DestContext, GeneratedDdl, SyncMode};
use crate::application::index_length::IndexLengthPolicy;
use crate::application::migrate::DataMigrator;
use crate::domain::ports::{DdlExecutor, RowReader, RowWriter, SchemaReader};
use crate::domain::report::{
    DestinationReport, DestinationStatus, RunReport, RunWarning, StatementOutcome,
};
use crate::domain::schema::SchemaSnapshot;
use crate::domain::value_objects::RowFilter;
use crate::error::{Result, SyncError};
use crate::infrastructure::config::SyncSettings;

/// Master-side connections: schema reads plus row streaming. sqlx pools
/// are internally synchronized, so one handle serves all workers.
#[derive(Clone)]
pub struct MasterHandle {
    pub database: String,
    pub schema: Arc<dyn SchemaReader>,
    pub rows: Arc<dyn RowReader>,
}

/// One destination's connections. Each destination owns these exclusively.
#[derive(Clone)]
pub struct DestinationHandle {
    pub database: String,
    pub schema: Arc<dyn SchemaReader>,
    pub ddl: Arc<dyn DdlExecutor>,
    pub rows: Arc<dyn RowWriter>,
}

pub struct SyncService {
    settings: SyncSettings,
}

impl SyncService {
    pub fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }

    /// Run one synchronization pass against every destination.
    ///
    /// Fails only when the master itself cannot be introspected; anything
    /// that goes wrong at a destination is captured in its report and the
    /// other destinations keep going.
    pub async fn run(
        &self,
        master: MasterHandle,
        destinations: Vec<DestinationHandle>,
        mode: SyncMode,
        filter: RowFilter,
        cancel: watch::Receiver<bool>,
    ) -> Result<RunReport> {
        let snapshot = Arc::new(master.schema.introspect().await?);
        info!(
            database = %master.database,
            tables = snapshot.tables.len(),
            routines = snapshot.routines.len(),
            "master snapshot captured"
        );

        let mut handles = Vec::with_capacity(destinations.len());
        for dest in destinations {
            let snapshot = Arc::clone(&snapshot);
            let master_rows = Arc::clone(&master.rows);
            let settings = self.settings.clone();
            let filter = filter.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                sync_destination(dest, snapshot, master_rows, mode, filter, settings, cancel)
                    .await
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(join_err) => {
                    // A panicked worker still yields a report entry.
                    let mut r = DestinationReport::new("<unknown>");
                    r.status = DestinationStatus::Failed;
                    r.error = Some(format!("worker panicked: {join_err}"));
                    reports.push(r);
                }
            }
        }

        Ok(RunReport::new(&master.database, mode.as_str(), reports))
    }

    /// Dry run: introspect everything and generate, but execute nothing.
    /// Returns the statements that `run` would have issued per destination.
    pub async fn plan(
        &self,
        master: MasterHandle,
        destinations: Vec<DestinationHandle>,
        mode: SyncMode,
    ) -> Result<Vec<(String, GeneratedDdl)>> {
        let snapshot = master.schema.introspect().await?;
        let mut plans = Vec::with_capacity(destinations.len());
        for dest in destinations {
            let dest_snapshot = dest.schema.introspect().await?;
            let generated = generate_for(&snapshot, &dest_snapshot, mode, &self.settings);
            plans.push((dest.database, generated));
        }
        Ok(plans)
    }
}

fn generate_for(
    master: &SchemaSnapshot,
    dest: &SchemaSnapshot,
    mode: SyncMode,
    settings: &SyncSettings,
) -> GeneratedDdl {
    let generator = DdlGenerator::new(IndexLengthPolicy::new(settings.max_index_key_bytes));
    let ctx = DestContext::of(dest);
    match mode {
        SyncMode::Overwrite => generator.generate_overwrite(master, dest, &ctx),
        SyncMode::Update => {
            let diff = SchemaDiffer::new().diff(master, dest);
            generator.generate_update(&diff, master, &ctx)
        }
        SyncMode::DataOnly => GeneratedDdl::default(),
    }
}

/// The whole pipeline for one destination. Never returns Err: every
/// failure is folded into the report.
#[instrument(skip_all, fields(destination = %dest.database), level = "info")]
async fn sync_destination(
    dest: DestinationHandle,
    master: Arc<SchemaSnapshot>,
    master_rows: Arc<dyn RowReader>,
    mode: SyncMode,
    filter: RowFilter,
    settings: SyncSettings,
    cancel: watch::Receiver<bool>,
) -> DestinationReport {
    let mut report = DestinationReport::new(&dest.database);

    let dest_snapshot = match dest.schema.introspect().await {
        Ok(s) => s,
        Err(err) => {
            error!("introspection failed: {err}");
            report.status = DestinationStatus::Failed;
            report.error = Some(err.to_string());
            return report;
        }
    };

    let generated = generate_for(master.as_ref(), &dest_snapshot, mode, &settings);
    report.warnings.extend(generated.warnings.clone());

    for stmt in &generated.statements {
        if *cancel.borrow() {
            warn!("cancelled, no further statements will be issued");
            report.status = DestinationStatus::Cancelled;
            report.finish();
            return report;
        }
        if let Some(reason) = &stmt.skip {
            report.record(
                stmt.sql.clone(),
                StatementOutcome::Skipped {
                    reason: reason.clone(),
                },
            );
            continue;
        }
        match dest.ddl.execute(&stmt.sql).await {
            Ok(()) => report.record(stmt.sql.clone(), StatementOutcome::Executed),
            Err(err) => {
                error!(statement = %stmt.sql, "statement failed: {err}");
                report.record(
                    stmt.sql.clone(),
                    StatementOutcome::Failed {
                        error: err.to_string(),
                    },
                );
                // Fatal for this destination's remaining schema work.
                report.status = DestinationStatus::Failed;
                report.error = Some(err.to_string());
                report.finish();
                return report;
            }
        }
    }

    if mode == SyncMode::DataOnly {
        migrate_all_tables(
            &dest,
            master.as_ref(),
            &dest_snapshot,
            master_rows.as_ref(),
            &filter,
            &settings,
            &cancel,
            &mut report,
        )
        .await;
    }

    report.finish();
    report
}

/// Copy every master table that also exists on the destination. A table
/// failure is recorded and the remaining tables continue; cancellation
/// stops the whole loop.
#[allow(clippy::too_many_arguments)]
async fn migrate_all_tables(
    dest: &DestinationHandle,
    master: &SchemaSnapshot,
    dest_snapshot: &SchemaSnapshot,
    master_rows: &dyn RowReader,
    filter: &RowFilter,
    settings: &SyncSettings,
    cancel: &watch::Receiver<bool>,
    report: &mut DestinationReport,
) {
    let migrator = DataMigrator::new(settings.batch_size, settings.retry_budget);

    for (name, table) in &master.tables {
        let dest_table = dest_snapshot.table(name);
        if dest_table.is_none() {
            report.warnings.push(RunWarning::TableSkipped {
                table: name.clone(),
                reason: "absent on destination".into(),
            });
            continue;
        }

        match migrator
            .migrate_table(
                master_rows,
                dest.rows.as_ref(),
                table,
                dest_table,
                filter.as_deref(),
                settings.truncate_before_copy,
                cancel,
            )
            .await
        {
            Ok(rows) => {
                report.rows_migrated.insert(name.clone(), rows);
            }
            Err(SyncError::Cancelled) => {
                report.status = DestinationStatus::Cancelled;
                return;
            }
            Err(err) => {
                // Fatal for this table only.
                if let SyncError::DataTransfer { rows_committed, .. } = &err {
                    report.rows_migrated.insert(name.clone(), *rows_committed);
                }
                report.table_errors.insert(name.clone(), err.to_string());
            }
        }
    }
}
