use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of schemasync's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                            |
/// |---------|-----------------|----------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting               |
/// | `Info`  | `info`          | Default — per-destination progress     |
/// | `Debug` | `debug`         | `--verbose` — shows every SQL statement |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for schemasync.
///
/// This is a convenience wrapper around `tracing_subscriber`. It respects
/// `RUST_LOG` when set, falling back to `level` otherwise.
///
/// Call this **once** at application startup, before any schemasync async
/// function. Library consumers who manage their own subscriber should skip
/// this and configure tracing themselves.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "schemasync=error",
        LogLevel::Info => "schemasync=info",
        LogLevel::Debug => "schemasync=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::collation::resolve_collation;
pub use application::differ::SchemaDiffer;
pub use application::generator::{DdlGenerator, DestContext, GeneratedDdl, SyncMode};
pub use application::index_length::{IndexLengthPolicy, IndexResolution, KeyPart};
pub use application::sync::{DestinationHandle, MasterHandle, SyncService};
pub use domain::change::{ChangeOp, SchemaDiff};
pub use domain::report::{DestinationReport, RunReport, RunStatus, RunWarning};
pub use domain::schema::{
    ColumnDef, IndexDef, RoutineDef, SchemaSnapshot, TableDef, PRIMARY_KEY_NAME,
};
pub use domain::value_objects::{Charset, Collation, RowFilter};
pub use error::SyncError;
pub use infrastructure::config::{AppConfig, DbConfig, SyncSettings};

use crate::infrastructure::db::client::{
    connect, MySqlDdlExecutor, MySqlRowReader, MySqlRowWriter, MySqlSchemaReader,
};

// ─── Public entry points ───

/// Run one synchronization pass without external cancellation.
///
/// Use [`run_with_cancel`] to wire in an operator abort signal, or
/// [`plan`] for a dry run that executes nothing.
pub async fn run(cfg: &AppConfig, mode: SyncMode, filter: RowFilter) -> Result<RunReport> {
    let (_tx, rx) = watch::channel(false);
    run_with_cancel(cfg, mode, filter, rx).await
}

/// Run one synchronization pass.
///
/// Flipping `cancel` to `true` lets any in-flight statement finish, then
/// stops each destination before its next statement or batch. The report
/// marks those destinations `Cancelled`.
pub async fn run_with_cancel(
    cfg: &AppConfig,
    mode: SyncMode,
    filter: RowFilter,
    cancel: watch::Receiver<bool>,
) -> Result<RunReport> {
    let master = master_handle(&cfg.master).await?;
    let mut destinations = Vec::with_capacity(cfg.destinations.len());
    for dest_cfg in &cfg.destinations {
        destinations.push(destination_handle(dest_cfg).await?);
    }

    let service = SyncService::new(cfg.sync.clone());
    let report = service
        .run(master, destinations, mode, filter, cancel)
        .await?;
    Ok(report)
}

/// Dry run: introspect master and destinations, generate the DDL each
/// destination would receive, execute nothing.
pub async fn plan(cfg: &AppConfig, mode: SyncMode) -> Result<Vec<(String, GeneratedDdl)>> {
    let master = master_handle(&cfg.master).await?;
    let mut destinations = Vec::with_capacity(cfg.destinations.len());
    for dest_cfg in &cfg.destinations {
        destinations.push(destination_handle(dest_cfg).await?);
    }

    let service = SyncService::new(cfg.sync.clone());
    Ok(service.plan(master, destinations, mode).await?)
}

// ─── Private helpers ───────────────────────────────────────────────────────────

/// Connect to the master. The schema reader and row reader share one pool;
/// sqlx pools are internally synchronized, so all destination workers can
/// read through it concurrently.
async fn master_handle(cfg: &DbConfig) -> Result<MasterHandle> {
    let pool = connect(cfg).await?;
    Ok(MasterHandle {
        database: cfg.dbname.clone(),
        schema: Arc::new(MySqlSchemaReader::new(pool.clone(), cfg.dbname.as_str())),
        rows: Arc::new(MySqlRowReader::new(pool, cfg.dbname.as_str())),
    })
}

/// Connect to one destination. Each destination owns its pool exclusively.
async fn destination_handle(cfg: &DbConfig) -> Result<DestinationHandle> {
    let pool = connect(cfg).await?;
    Ok(DestinationHandle {
        database: cfg.dbname.clone(),
        schema: Arc::new(MySqlSchemaReader::new(pool.clone(), cfg.dbname.as_str())),
        ddl: Arc::new(MySqlDdlExecutor::new(pool.clone())),
        rows: Arc::new(MySqlRowWriter::new(pool, cfg.dbname.as_str())),
    })
}
