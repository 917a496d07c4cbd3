//! sqlx-backed implementations of the engine's ports.
//!
//! Introspection reads `information_schema` exclusively, with bound
//! parameters, so it is safe against a live server. Numeric metadata
//! columns are CAST to signed in SQL because their declared signedness
//! differs between MySQL and MariaDB versions.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::ports::{DdlExecutor, RowReader, RowValues, RowWriter, SchemaReader};
use crate::domain::schema::{
    ColumnDef, IndexColumn, IndexDef, IndexKind, RoutineDef, RoutineKind, SchemaSnapshot,
    TableDef, PRIMARY_KEY_NAME,
};
use crate::domain::value_objects::{Charset, Collation};
use crate::error::{Result, SyncError};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::row_values::decode_row;
use crate::infrastructure::db::sql_utils::{
    build_batch_select, build_delete_all, build_insert, quote_ident,
};

/// Connect to the database described in `cfg`.
pub async fn connect(cfg: &DbConfig) -> AnyResult<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| format!("Failed to connect to {} on {}", cfg.dbname, cfg.host))?;

    debug!("Connected to {}/{}", cfg.host, cfg.dbname);
    Ok(pool)
}

fn introspection_err(database: &str, source: sqlx::Error) -> SyncError {
    SyncError::Introspection {
        database: database.to_string(),
        source,
    }
}

// ─── Schema reader ───────────────────────────────────────────────────────────

pub struct MySqlSchemaReader {
    pool: MySqlPool,
    database: String,
}

impl MySqlSchemaReader {
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    async fn read_defaults(&self) -> Result<(Charset, Collation)> {
        let row = sqlx::query(
            "SELECT DEFAULT_CHARACTER_SET_NAME, DEFAULT_COLLATION_NAME \
             FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
        )
        .bind(&self.database)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| introspection_err(&self.database, e))?;

        Ok(match row {
            Some(row) => {
                let charset: String = row
                    .try_get(0)
                    .map_err(|e| introspection_err(&self.database, e))?;
                let collation: String = row
                    .try_get(1)
                    .map_err(|e| introspection_err(&self.database, e))?;
                (Charset(charset), Collation(collation))
            }
            None => (
                Charset("utf8mb4".into()),
                Collation("utf8mb4_unicode_ci".into()),
            ),
        })
    }

    async fn read_tables(&self) -> Result<BTreeMap<String, TableDef>> {
        let rows = sqlx::query(
            "SELECT TABLE_NAME, ENGINE, TABLE_COLLATION \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| introspection_err(&self.database, e))?;

        let mut tables = BTreeMap::new();
        for row in &rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| introspection_err(&self.database, e))?;
            let engine: Option<String> = row
                .try_get(1)
                .map_err(|e| introspection_err(&self.database, e))?;
            let collation: Option<String> = row
                .try_get(2)
                .map_err(|e| introspection_err(&self.database, e))?;
            // TABLE_COLLATION implies the charset: `utf8mb4_unicode_ci`
            // belongs to `utf8mb4`.
            let charset = collation
                .as_deref()
                .and_then(|c| c.split('_').next())
                .map(|c| Charset(c.to_string()));
            tables.insert(
                name.clone(),
                TableDef {
                    name,
                    columns: Vec::new(),
                    indexes: Vec::new(),
                    charset,
                    collation: collation.map(Collation),
                    engine,
                },
            );
        }
        Ok(tables)
    }

    async fn read_columns(&self, tables: &mut BTreeMap<String, TableDef>) -> Result<()> {
        let rows = sqlx::query(
            "SELECT TABLE_NAME, COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, \
                    CHARACTER_SET_NAME, COLLATION_NAME, EXTRA, \
                    CAST(ORDINAL_POSITION AS SIGNED) \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = ? \
             ORDER BY TABLE_NAME, ORDINAL_POSITION",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| introspection_err(&self.database, e))?;

        for row in &rows {
            let err = |e| introspection_err(&self.database, e);
            let table: String = row.try_get(0).map_err(err)?;
            let Some(def) = tables.get_mut(&table) else {
                continue; // view or out-of-scope object
            };
            let name: String = row.try_get(1).map_err(err)?;
            let declared_type: String = row.try_get(2).map_err(err)?;
            let is_nullable: String = row.try_get(3).map_err(err)?;
            let default: Option<String> = row.try_get(4).map_err(err)?;
            let charset: Option<String> = row.try_get(5).map_err(err)?;
            let collation: Option<String> = row.try_get(6).map_err(err)?;
            let extra: String = row.try_get(7).map_err(err)?;
            let ordinal: i64 = row.try_get(8).map_err(err)?;

            def.columns.push(ColumnDef {
                name,
                declared_type,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
                default,
                charset: charset.map(Charset),
                collation: collation.map(Collation),
                auto_increment: extra.to_lowercase().contains("auto_increment"),
                ordinal: ordinal.max(0) as u32,
            });
        }
        Ok(())
    }

    async fn read_indexes(&self, tables: &mut BTreeMap<String, TableDef>) -> Result<()> {
        let rows = sqlx::query(
            "SELECT TABLE_NAME, INDEX_NAME, CAST(NON_UNIQUE AS SIGNED), \
                    CAST(SEQ_IN_INDEX AS SIGNED), COLUMN_NAME, \
                    CAST(SUB_PART AS SIGNED), INDEX_TYPE \
             FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = ? \
             ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| introspection_err(&self.database, e))?;

        for row in &rows {
            let err = |e| introspection_err(&self.database, e);
            let table: String = row.try_get(0).map_err(err)?;
            let Some(def) = tables.get_mut(&table) else {
                continue;
            };
            let index_name: String = row.try_get(1).map_err(err)?;
            let non_unique: i64 = row.try_get(2).map_err(err)?;
            let column: String = row.try_get(4).map_err(err)?;
            let sub_part: Option<i64> = row.try_get(5).map_err(err)?;
            let index_type: String = row.try_get(6).map_err(err)?;

            let kind = if index_name == PRIMARY_KEY_NAME {
                IndexKind::Primary
            } else if index_type.eq_ignore_ascii_case("FULLTEXT") {
                IndexKind::Fulltext
            } else if non_unique == 0 {
                IndexKind::Unique
            } else {
                IndexKind::Plain
            };

            let part = IndexColumn {
                name: column,
                prefix: sub_part.and_then(|p| u32::try_from(p).ok()),
            };

            // Rows arrive ordered by SEQ_IN_INDEX; append to the index if
            // it is already open, otherwise start it.
            match def.indexes.iter_mut().find(|i| i.name == index_name) {
                Some(index) => index.columns.push(part),
                None => def.indexes.push(IndexDef {
                    name: index_name,
                    columns: vec![part],
                    kind,
                }),
            }
        }
        Ok(())
    }

    async fn read_routines(&self) -> Result<BTreeMap<String, RoutineDef>> {
        let mut routines = BTreeMap::new();
        let err = |e| introspection_err(&self.database, e);

        let triggers = sqlx::query(
            "SELECT TRIGGER_NAME, EVENT_OBJECT_TABLE \
             FROM information_schema.TRIGGERS WHERE TRIGGER_SCHEMA = ? \
             ORDER BY TRIGGER_NAME",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(err)?;

        for row in &triggers {
            let name: String = row.try_get(0).map_err(err)?;
            let table: String = row.try_get(1).map_err(err)?;
            // SHOW CREATE TRIGGER: column 2 is "SQL Original Statement".
            let show = sqlx::query(&format!("SHOW CREATE TRIGGER {}", quote_ident(&name)))
                .fetch_one(&self.pool)
                .await
                .map_err(err)?;
            let definition: String = show.try_get(2).map_err(err)?;
            routines.insert(
                name.clone(),
                RoutineDef {
                    name,
                    kind: RoutineKind::Trigger,
                    definition,
                    table: Some(table),
                },
            );
        }

        let procs = sqlx::query(
            "SELECT ROUTINE_NAME, ROUTINE_TYPE \
             FROM information_schema.ROUTINES WHERE ROUTINE_SCHEMA = ? \
             ORDER BY ROUTINE_NAME",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(err)?;

        for row in &procs {
            let name: String = row.try_get(0).map_err(err)?;
            let routine_type: String = row.try_get(1).map_err(err)?;
            let kind = if routine_type.eq_ignore_ascii_case("FUNCTION") {
                RoutineKind::Function
            } else {
                RoutineKind::Procedure
            };
            // Column 2 is "Create Procedure" / "Create Function".
            let show = sqlx::query(&format!(
                "SHOW CREATE {} {}",
                kind.keyword(),
                quote_ident(&name)
            ))
            .fetch_one(&self.pool)
            .await
            .map_err(err)?;
            let definition: Option<String> = show.try_get(2).map_err(err)?;
            let Some(definition) = definition else {
                // Body hidden from this account; nothing we could replay.
                continue;
            };
            routines.insert(
                name.clone(),
                RoutineDef {
                    name,
                    kind,
                    definition,
                    table: None,
                },
            );
        }

        Ok(routines)
    }
}

#[async_trait]
impl SchemaReader for MySqlSchemaReader {
    async fn introspect(&self) -> Result<SchemaSnapshot> {
        let (default_charset, default_collation) = self.read_defaults().await?;
        let mut tables = self.read_tables().await?;
        self.read_columns(&mut tables).await?;
        self.read_indexes(&mut tables).await?;
        let routines = self.read_routines().await?;

        debug!(
            database = %self.database,
            tables = tables.len(),
            routines = routines.len(),
            "introspection complete"
        );

        Ok(SchemaSnapshot {
            database: self.database.clone(),
            tables,
            routines,
            default_charset,
            default_collation,
        })
    }
}

// ─── DDL executor ────────────────────────────────────────────────────────────

pub struct MySqlDdlExecutor {
    pool: MySqlPool,
}

impl MySqlDdlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DdlExecutor for MySqlDdlExecutor {
    async fn execute(&self, sql: &str) -> Result<()> {
        debug!("Executing: {sql}");
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|source| SyncError::Execution {
                statement: sql.to_string(),
                source,
            })?;
        Ok(())
    }
}

// ─── Row reader / writer ─────────────────────────────────────────────────────

pub struct MySqlRowReader {
    pool: MySqlPool,
    database: String,
}

impl MySqlRowReader {
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }
}

#[async_trait]
impl RowReader for MySqlRowReader {
    async fn fetch_batch(
        &self,
        table: &str,
        select_exprs: &[String],
        order_by: &[String],
        filter: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RowValues>> {
        let sql = build_batch_select(
            &self.database,
            table,
            select_exprs,
            order_by,
            filter,
            offset,
            limit,
        );
        debug!("Fetching: {sql}");
        let read_err = |source| SyncError::Read {
            table: table.to_string(),
            source,
        };

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(decode_row(row).map_err(read_err)?);
        }
        Ok(out)
    }
}

pub struct MySqlRowWriter {
    pool: MySqlPool,
    database: String,
}

impl MySqlRowWriter {
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }
}

/// SQLSTATE class 23 covers integrity constraint violations; those must
/// not be retried.
fn is_constraint_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.starts_with("23"))
        .unwrap_or(false)
}

#[async_trait]
impl RowWriter for MySqlRowWriter {
    async fn insert_batch(&self, table: &str, columns: &[String], rows: &[String]) -> Result<u64> {
        let sql = build_insert(&self.database, table, columns, rows);
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|source| SyncError::Write {
                table: table.to_string(),
                constraint: is_constraint_violation(&source),
                source,
            })?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self, table: &str) -> Result<u64> {
        let sql = build_delete_all(&self.database, table);
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|source| SyncError::Write {
                table: table.to_string(),
                constraint: false,
                source,
            })?;
        Ok(result.rows_affected())
    }
}
