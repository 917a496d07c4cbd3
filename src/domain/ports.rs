use crate::domain::report::RunReport;
use crate::domain::schema::SchemaSnapshot;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One fetched row, values aligned with the column list the caller passed.
pub type RowValues = Vec<Value>;

/// Port: read a database's structural metadata (implemented by
/// MySqlSchemaReader). Read queries only; safe against a live database.
#[async_trait]
pub trait SchemaReader: Send + Sync {
    async fn introspect(&self) -> Result<SchemaSnapshot>;
}

/// Port: execute one DDL statement at a destination (implemented by
/// MySqlDdlExecutor).
#[async_trait]
pub trait DdlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<()>;
}

/// Port: stream rows out of the master in bounded batches (implemented by
/// MySqlRowReader). `select_exprs` are already-rendered SELECT expressions,
/// one per column; `filter` is applied verbatim as a WHERE clause.
#[async_trait]
pub trait RowReader: Send + Sync {
    async fn fetch_batch(
        &self,
        table: &str,
        select_exprs: &[String],
        order_by: &[String],
        filter: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RowValues>>;
}

/// Port: write row batches into a destination table (implemented by
/// MySqlRowWriter). `insert_batch` appends; it never upserts.
#[async_trait]
pub trait RowWriter: Send + Sync {
    async fn insert_batch(&self, table: &str, columns: &[String], rows: &[String]) -> Result<u64>;

    /// Delete all rows, for overwrite-style data copies.
    async fn delete_all(&self, table: &str) -> Result<u64>;
}

/// Port: output formatting (implemented by JsonWriter, SqlWriter)
pub trait ReportWriter: Send + Sync {
    /// Serializes the run report to a string (JSON, SQL script, etc.)
    fn format(&self, report: &RunReport) -> anyhow::Result<String>;
    /// Extension of the produced file (e.g. "json", "sql")
    fn extension(&self) -> &'static str;
}
