//! Error types for the synchronization engine.

use thiserror::Error;

/// Main error type for synchronization operations.
///
/// Failures are scoped to the narrowest unit possible: an introspection
/// failure aborts one destination's run, an execution failure aborts one
/// destination's remaining schema work, a data transfer failure aborts one
/// table. Generation problems are never errors; they become
/// [`RunWarning`](crate::domain::report::RunWarning) entries in the report.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (unreadable TOML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema metadata could not be read from a database.
    #[error("Introspection failed for {database}: {source}")]
    Introspection {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// A DDL statement failed at the destination.
    #[error("Statement failed: {statement}: {source}")]
    Execution {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    /// A read query against the master failed mid-transfer.
    #[error("Read failed for table {table}: {source}")]
    Read {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// A single batch write failed. `constraint` distinguishes integrity
    /// violations (never retried) from transient connection errors.
    #[error("Write failed for table {table}: {source}")]
    Write {
        table: String,
        constraint: bool,
        #[source]
        source: sqlx::Error,
    },

    /// Data copy for a table failed after the retry budget was exhausted.
    /// `rows_committed` counts rows successfully written before the failure
    /// so the caller can resume or report partial completion.
    #[error("Data transfer failed for table {table} after {rows_committed} committed row(s): {message}")]
    DataTransfer {
        table: String,
        rows_committed: u64,
        message: String,
    },

    /// The run was cancelled by the operator.
    #[error("Run cancelled")]
    Cancelled,
}

impl SyncError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Config(message.into())
    }

    /// True if the error may succeed on an immediate retry.
    /// Constraint violations and cancellations never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Write { constraint, .. } => !constraint,
            SyncError::Read { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
