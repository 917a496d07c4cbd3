//! Row data migration.
//!
//! Streams rows from master to destination in bounded batches. Rows are
//! appended, never upserted; rerunning a copy into a non-empty table will
//! duplicate rows, which is an accepted limitation. Only columns present
//! on both sides are copied.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::ports::{RowReader, RowValues, RowWriter};
use crate::domain::schema::TableDef;
use crate::error::{Result, SyncError};
use crate::infrastructure::db::sql_utils::{codec_for, render_row, select_expr, ValueCodec};

pub struct DataMigrator {
    batch_size: u64,
    /// Immediate retries allowed per failed batch. Constraint violations
    /// never retry.
    retry_budget: u32,
}

impl DataMigrator {
    pub fn new(batch_size: u64, retry_budget: u32) -> Self {
        Self {
            batch_size: batch_size.max(1),
            retry_budget,
        }
    }

    /// Copy one table's rows. Returns the number of rows committed.
    ///
    /// Returns zero without touching the writer when the destination lacks
    /// the table or shares no columns with the master. On failure after
    /// the retry budget, the error carries how many rows were already
    /// committed so the caller can resume or report partial completion.
    pub async fn migrate_table(
        &self,
        reader: &dyn RowReader,
        writer: &dyn RowWriter,
        master_table: &TableDef,
        dest_table: Option<&TableDef>,
        filter: Option<&str>,
        truncate_first: bool,
        cancel: &watch::Receiver<bool>,
    ) -> Result<u64> {
        let table = master_table.name.as_str();

        let Some(dest_table) = dest_table else {
            debug!(table, "table absent on destination, skipping data copy");
            return Ok(0);
        };

        // Columns both sides know, in master order.
        let common: Vec<&crate::domain::schema::ColumnDef> = master_table
            .columns
            .iter()
            .filter(|c| dest_table.column(&c.name).is_some())
            .collect();
        if common.is_empty() {
            debug!(table, "no common columns, skipping data copy");
            return Ok(0);
        }

        let columns: Vec<String> = common.iter().map(|c| c.name.clone()).collect();
        let codecs: Vec<ValueCodec> = common
            .iter()
            .map(|c| codec_for(&c.declared_type))
            .collect();
        let select_exprs: Vec<String> = columns
            .iter()
            .zip(codecs.iter())
            .map(|(name, codec)| select_expr(name, *codec))
            .collect();
        let order_by: Vec<String> = master_table
            .primary_key()
            .map(|pk| pk.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();

        let mut committed: u64 = 0;

        if truncate_first {
            self.with_retries(table, committed, || writer.delete_all(table))
                .await?;
        }

        let mut offset: u64 = 0;
        loop {
            if *cancel.borrow() {
                info!(table, committed, "cancelled, aborting before next batch");
                return Err(SyncError::Cancelled);
            }

            let batch = self
                .with_retries(table, committed, || {
                    reader.fetch_batch(
                        table,
                        &select_exprs,
                        &order_by,
                        filter,
                        offset,
                        self.batch_size,
                    )
                })
                .await?;
            if batch.is_empty() {
                break;
            }

            let rendered: Vec<String> = batch
                .iter()
                .map(|row: &RowValues| render_row(row, &codecs))
                .collect();
            let written = self
                .with_retries(table, committed, || {
                    writer.insert_batch(table, &columns, &rendered)
                })
                .await?;
            committed += written;

            if (batch.len() as u64) < self.batch_size {
                break;
            }
            offset += self.batch_size;
        }

        info!(table, rows = committed, "data copy complete");
        Ok(committed)
    }

    /// Run an operation with the immediate-retry budget. Non-retryable
    /// errors (constraint violations) fail on the first attempt; the rest
    /// get `retry_budget` extra tries. Failure is reported as a
    /// DataTransfer error carrying the committed row count.
    async fn with_retries<T, F, Fut>(&self, table: &str, committed: u64, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(err) if err.is_retryable() && attempt < self.retry_budget => {
                    attempt += 1;
                    warn!(table, attempt, "transient error, retrying: {err}");
                }
                Err(err) => {
                    return Err(SyncError::DataTransfer {
                        table: table.to_string(),
                        rows_committed: committed,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}
