//! DDL generation.
//!
//! Turns a full master schema (overwrite mode) or a [`SchemaDiff`] (update
//! mode) into an ordered sequence of statements. Generation is dry-run
//! safe: nothing here executes SQL. A statement that cannot be generated
//! safely (an infeasible index) is emitted as skipped with a warning so
//! the rest of the run proceeds.

use crate::application::collation::{bytes_per_char, resolve_collation};
use crate::application::index_length::{
    is_text_like, IndexLengthPolicy, IndexResolution, KeyPart,
};
use crate::domain::change::{ChangeOp, SchemaDiff};
use crate::domain::report::RunWarning;
use crate::domain::schema::{
    ColumnDef, IndexDef, IndexKind, RoutineDef, SchemaSnapshot, TableDef,
};
use crate::domain::value_objects::{Charset, Collation};
use crate::infrastructure::db::sql_utils::{qualify, quote_ident};

/// Synchronization policy selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Drop every destination table, recreate the whole master schema.
    Overwrite,
    /// Add missing structure only; never drop or reorder what exists.
    Update,
    /// Schema untouched, rows copied.
    DataOnly,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Overwrite => "overwrite",
            SyncMode::Update => "update",
            SyncMode::DataOnly => "data-only",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated statement. `skip` carries the reason when generation
/// downgraded the statement instead of producing an executable one.
#[derive(Debug, Clone)]
pub struct DdlStatement {
    pub sql: String,
    pub skip: Option<String>,
}

impl DdlStatement {
    fn run(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            skip: None,
        }
    }

    fn skipped(sql: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            skip: Some(reason.into()),
        }
    }
}

/// Ordered statements plus the warnings generation produced.
#[derive(Debug, Clone, Default)]
pub struct GeneratedDdl {
    pub statements: Vec<DdlStatement>,
    pub warnings: Vec<RunWarning>,
}

/// Destination-side context the generator normalizes against.
#[derive(Debug, Clone)]
pub struct DestContext {
    pub database: String,
    pub default_charset: Charset,
    pub default_collation: Collation,
}

impl DestContext {
    pub fn of(snapshot: &SchemaSnapshot) -> Self {
        Self {
            database: snapshot.database.clone(),
            default_charset: snapshot.default_charset.clone(),
            default_collation: snapshot.default_collation.clone(),
        }
    }
}

pub struct DdlGenerator {
    policy: IndexLengthPolicy,
}

impl DdlGenerator {
    pub fn new(policy: IndexLengthPolicy) -> Self {
        Self { policy }
    }

    /// Overwrite mode: drop everything the destination has, then recreate
    /// the master schema from scratch. Foreign key checks are disabled for
    /// the duration so drop order cannot matter.
    pub fn generate_overwrite(
        &self,
        master: &SchemaSnapshot,
        dest: &SchemaSnapshot,
        ctx: &DestContext,
    ) -> GeneratedDdl {
        let mut out = GeneratedDdl::default();
        out.statements
            .push(DdlStatement::run("SET FOREIGN_KEY_CHECKS = 0"));

        for name in dest.table_names() {
            out.statements.push(DdlStatement::run(format!(
                "DROP TABLE IF EXISTS {}",
                qualify(&ctx.database, name)
            )));
        }

        for table in master.tables.values() {
            self.push_create_table(table, ctx, &mut out);
        }

        for routine in master.routines.values() {
            self.push_recreate_routine(routine, &mut out);
        }

        out.statements
            .push(DdlStatement::run("SET FOREIGN_KEY_CHECKS = 1"));
        out
    }

    /// Update mode: render each diff op in the order the differ produced.
    /// The master snapshot supplies column definitions for index math.
    pub fn generate_update(
        &self,
        diff: &SchemaDiff,
        master: &SchemaSnapshot,
        ctx: &DestContext,
    ) -> GeneratedDdl {
        let mut out = GeneratedDdl::default();
        for op in &diff.ops {
            match op {
                ChangeOp::CreateTable(table) => self.push_create_table(table, ctx, &mut out),
                ChangeOp::DropTable { table } => {
                    out.statements.push(DdlStatement::run(format!(
                        "DROP TABLE IF EXISTS {}",
                        qualify(&ctx.database, table)
                    )));
                }
                ChangeOp::AddColumn { table, column } => {
                    out.statements.push(DdlStatement::run(format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        qualify(&ctx.database, table),
                        self.column_ddl(column, ctx, &mut out.warnings)
                    )));
                }
                ChangeOp::ModifyColumn { table, column } => {
                    out.statements.push(DdlStatement::run(format!(
                        "ALTER TABLE {} MODIFY COLUMN {}",
                        qualify(&ctx.database, table),
                        self.column_ddl(column, ctx, &mut out.warnings)
                    )));
                }
                ChangeOp::DropColumn { table, column } => {
                    out.statements.push(DdlStatement::run(format!(
                        "ALTER TABLE {} DROP COLUMN {}",
                        qualify(&ctx.database, table),
                        quote_ident(column)
                    )));
                }
                ChangeOp::AddIndex { table, index } => {
                    if let Some(table_def) = master.table(table) {
                        self.push_index(table_def, index, ctx, &mut out);
                    }
                }
                ChangeOp::DropIndex { table, index } => {
                    let sql = if index == crate::domain::schema::PRIMARY_KEY_NAME {
                        format!(
                            "ALTER TABLE {} DROP PRIMARY KEY",
                            qualify(&ctx.database, table)
                        )
                    } else {
                        format!(
                            "DROP INDEX {} ON {}",
                            quote_ident(index),
                            qualify(&ctx.database, table)
                        )
                    };
                    out.statements.push(DdlStatement::run(sql));
                }
                ChangeOp::CreateRoutine(routine) => self.push_recreate_routine(routine, &mut out),
                ChangeOp::DropRoutine { name, kind } => {
                    out.statements.push(DdlStatement::run(format!(
                        "DROP {} IF EXISTS {}",
                        kind.keyword(),
                        quote_ident(name)
                    )));
                }
            }
        }
        out
    }

    // ─── Table rendering ─────────────────────────────────────────────────────

    fn push_create_table(&self, table: &TableDef, ctx: &DestContext, out: &mut GeneratedDdl) {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("  {}", self.column_ddl(c, ctx, &mut out.warnings)))
            .collect();

        if let Some(pk) = table.primary_key() {
            parts.push(format!("  PRIMARY KEY ({})", self.key_list(table, pk, ctx)));
        }

        let (table_charset, table_collation) = resolve_collation(
            table.charset.as_ref(),
            table.collation.as_ref(),
            &ctx.default_charset,
            &ctx.default_collation,
        );

        let engine = table.engine.as_deref().unwrap_or("InnoDB");
        out.statements.push(DdlStatement::run(format!(
            "CREATE TABLE {} (\n{}\n) ENGINE={} DEFAULT CHARSET={} COLLATE={}",
            qualify(&ctx.database, &table.name),
            parts.join(",\n"),
            engine,
            table_charset,
            table_collation
        )));

        for index in table.secondary_indexes() {
            self.push_index(table, index, ctx, out);
        }
    }

    /// Render one column definition, consulting the normalizer for text
    /// types. A replaced master collation is recorded as a warning.
    fn column_ddl(
        &self,
        col: &ColumnDef,
        ctx: &DestContext,
        warnings: &mut Vec<RunWarning>,
    ) -> String {
        let mut sql = format!("{} {}", quote_ident(&col.name), col.declared_type);

        if is_text_like(&col.declared_type.to_lowercase()) {
            let (charset, collation) = resolve_collation(
                col.charset.as_ref(),
                col.collation.as_ref(),
                &ctx.default_charset,
                &ctx.default_collation,
            );
            if let Some(master_collation) = &col.collation {
                if *master_collation != collation {
                    warnings.push(RunWarning::CollationFallback {
                        scope: format!("column {}", col.name),
                        from: master_collation.to_string(),
                        to: collation.to_string(),
                    });
                }
            }
            sql.push_str(&format!(" CHARACTER SET {charset} COLLATE {collation}"));
        }

        sql.push_str(if col.nullable { " NULL" } else { " NOT NULL" });

        if let Some(default) = &col.default {
            sql.push_str(&format!(" DEFAULT {}", render_default(default)));
        }
        if col.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        sql
    }

    // ─── Index rendering ─────────────────────────────────────────────────────

    /// Resolve key prefixes for an index and emit it, or emit it as skipped
    /// with an `IndexSkipped` warning when no feasible allocation exists.
    fn push_index(
        &self,
        table: &TableDef,
        index: &IndexDef,
        ctx: &DestContext,
        out: &mut GeneratedDdl,
    ) {
        let sql = self.index_sql(table, index, ctx, None);
        match self.resolve_parts(table, index, ctx) {
            IndexResolution::Fits => out.statements.push(DdlStatement::run(sql)),
            IndexResolution::Prefixed(prefixes) => {
                let sql = self.index_sql(table, index, ctx, Some(&prefixes));
                out.statements.push(DdlStatement::run(sql));
            }
            IndexResolution::Infeasible { needed_bytes } => {
                out.warnings.push(RunWarning::IndexSkipped {
                    table: table.name.clone(),
                    index: index.name.clone(),
                    needed_bytes,
                    ceiling: self.policy.max_key_bytes,
                });
                out.statements
                    .push(DdlStatement::skipped(sql, "index exceeds key-length ceiling"));
            }
        }
    }

    fn resolve_parts(&self, table: &TableDef, index: &IndexDef, ctx: &DestContext) -> IndexResolution {
        let parts: Vec<KeyPart> = index
            .columns
            .iter()
            .map(|ic| {
                let Some(col) = table.column(&ic.name) else {
                    // Unknown column: treat as fixed so it cannot inflate
                    // the text budget.
                    return KeyPart::Fixed(8);
                };
                let bpc = if is_text_like(&col.declared_type.to_lowercase()) {
                    let (charset, _) = resolve_collation(
                        col.charset.as_ref(),
                        col.collation.as_ref(),
                        &ctx.default_charset,
                        &ctx.default_collation,
                    );
                    bytes_per_char(&charset)
                } else {
                    1
                };
                KeyPart::from_column(col, bpc, ic.prefix)
            })
            .collect();
        self.policy.resolve(&parts)
    }

    /// Render the index statement. `computed` overrides prefixes per column
    /// when the resolver had to shorten them.
    fn index_sql(
        &self,
        table: &TableDef,
        index: &IndexDef,
        ctx: &DestContext,
        computed: Option<&[Option<u32>]>,
    ) -> String {
        let key_cols: Vec<String> = index
            .columns
            .iter()
            .enumerate()
            .map(|(i, ic)| {
                let prefix = computed
                    .and_then(|p| p.get(i).copied().flatten())
                    .or(ic.prefix);
                match prefix {
                    Some(p) => format!("{}({})", quote_ident(&ic.name), p),
                    None => quote_ident(&ic.name),
                }
            })
            .collect();
        let key_list = key_cols.join(", ");
        let target = qualify(&ctx.database, &table.name);

        match index.kind {
            IndexKind::Primary => {
                format!("ALTER TABLE {target} ADD PRIMARY KEY ({key_list})")
            }
            IndexKind::Unique => format!(
                "CREATE UNIQUE INDEX {} ON {target} ({key_list})",
                quote_ident(&index.name)
            ),
            IndexKind::Fulltext => format!(
                "CREATE FULLTEXT INDEX {} ON {target} ({key_list})",
                quote_ident(&index.name)
            ),
            IndexKind::Plain => format!(
                "CREATE INDEX {} ON {target} ({key_list})",
                quote_ident(&index.name)
            ),
        }
    }

    /// Key list for the inline PRIMARY KEY clause, prefixes resolved the
    /// same way as standalone indexes.
    fn key_list(&self, table: &TableDef, index: &IndexDef, ctx: &DestContext) -> String {
        let computed = match self.resolve_parts(table, index, ctx) {
            IndexResolution::Prefixed(p) => Some(p),
            _ => None,
        };
        index
            .columns
            .iter()
            .enumerate()
            .map(|(i, ic)| {
                let prefix = computed
                    .as_ref()
                    .and_then(|p| p.get(i).copied().flatten())
                    .or(ic.prefix);
                match prefix {
                    Some(p) => format!("{}({})", quote_ident(&ic.name), p),
                    None => quote_ident(&ic.name),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ─── Routine rendering ───────────────────────────────────────────────────

    /// Routines are always dropped and recreated from the master's raw
    /// CREATE statement.
    fn push_recreate_routine(&self, routine: &RoutineDef, out: &mut GeneratedDdl) {
        out.statements.push(DdlStatement::run(format!(
            "DROP {} IF EXISTS {}",
            routine.kind.keyword(),
            quote_ident(&routine.name)
        )));
        out.statements
            .push(DdlStatement::run(routine.definition.clone()));
    }
}

/// Defaults come out of information_schema as bare strings. Numeric values
/// and the CURRENT_TIMESTAMP family go in unquoted; everything else is a
/// string literal.
fn render_default(default: &str) -> String {
    let upper = default.to_uppercase();
    if upper == "NULL"
        || upper.starts_with("CURRENT_TIMESTAMP")
        || default.parse::<f64>().is_ok()
    {
        default.to_string()
    } else {
        format!("'{}'", default.replace('\'', "''"))
    }
}
