//! Structural schema diffing.
//!
//! Additive-only: the diff never drops destination structure. Tables and
//! columns that exist only on the destination are left untouched; removing
//! extraneous structure is overwrite mode's job and is handled by the
//! generator, not here.

use crate::application::collation::resolve_collation;
use crate::application::index_length::is_text_like;
use crate::domain::change::{ChangeOp, SchemaDiff};
use crate::domain::schema::{ColumnDef, IndexDef, SchemaSnapshot, TableDef};

#[derive(Default)]
pub struct SchemaDiffer;

impl SchemaDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Compare two snapshots and produce the ordered change sequence that
    /// brings the destination up to the master, additively.
    ///
    /// Ordering: table creations first, then per-table column and index
    /// changes, routines last (so every table they reference exists).
    pub fn diff(&self, master: &SchemaSnapshot, dest: &SchemaSnapshot) -> SchemaDiff {
        let mut ops = Vec::new();

        for (name, table) in &master.tables {
            if dest.table(name).is_none() {
                ops.push(ChangeOp::CreateTable(table.clone()));
            }
        }

        for (name, master_table) in &master.tables {
            let Some(dest_table) = dest.table(name) else {
                continue;
            };
            self.diff_columns(master_table, dest_table, dest, &mut ops);
            self.diff_indexes(master_table, dest_table, &mut ops);
        }

        self.diff_routines(master, dest, &mut ops);

        SchemaDiff { ops }
    }

    /// Columns in master missing in destination are appended at the end of
    /// the destination table, never inserted at their master ordinal:
    /// update mode must not reorder existing columns.
    fn diff_columns(
        &self,
        master: &TableDef,
        dest: &TableDef,
        dest_snapshot: &SchemaSnapshot,
        ops: &mut Vec<ChangeOp>,
    ) {
        for col in &master.columns {
            match dest.column(&col.name) {
                None => ops.push(ChangeOp::AddColumn {
                    table: master.name.clone(),
                    column: col.clone(),
                }),
                Some(existing) => {
                    if column_drifted(col, existing, dest_snapshot) {
                        ops.push(ChangeOp::ModifyColumn {
                            table: master.name.clone(),
                            column: col.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Presence-based, add-only. A same-named index whose shape differs is
    /// replaced with a DropIndex + AddIndex pair; there is no ModifyIndex.
    fn diff_indexes(&self, master: &TableDef, dest: &TableDef, ops: &mut Vec<ChangeOp>) {
        for index in &master.indexes {
            match dest.index(&index.name) {
                None => ops.push(ChangeOp::AddIndex {
                    table: master.name.clone(),
                    index: index.clone(),
                }),
                Some(existing) if !index_equivalent(index, existing) => {
                    ops.push(ChangeOp::DropIndex {
                        table: master.name.clone(),
                        index: index.name.clone(),
                    });
                    ops.push(ChangeOp::AddIndex {
                        table: master.name.clone(),
                        index: index.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    /// Routines present on the master replace same-named destination
    /// routines when their definitions differ, and are created when
    /// missing. Destination-only routines are left alone.
    fn diff_routines(
        &self,
        master: &SchemaSnapshot,
        dest: &SchemaSnapshot,
        ops: &mut Vec<ChangeOp>,
    ) {
        for (name, routine) in &master.routines {
            match dest.routines.get(name) {
                None => ops.push(ChangeOp::CreateRoutine(routine.clone())),
                Some(existing)
                    if normalize_ws(&existing.definition) != normalize_ws(&routine.definition) =>
                {
                    ops.push(ChangeOp::DropRoutine {
                        name: name.clone(),
                        kind: routine.kind,
                    });
                    ops.push(ChangeOp::CreateRoutine(routine.clone()));
                }
                Some(_) => {}
            }
        }
    }
}

/// Case-folded, whitespace-collapsed type signature. `VARCHAR(255)` and
/// `varchar(255)` must compare equal; `varchar(255)` and `varchar(191)`
/// must not.
pub fn normalize_type(declared: &str) -> String {
    normalize_ws(&declared.to_lowercase())
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the master column's effective definition differs from what
/// the destination already has. Effective means after normalization: the
/// charset comparison goes through the collation resolver, so a master
/// `utf8` column against a destination already at `utf8mb4` is not drift.
fn column_drifted(master: &ColumnDef, dest: &ColumnDef, dest_snapshot: &SchemaSnapshot) -> bool {
    if normalize_type(&master.declared_type) != normalize_type(&dest.declared_type) {
        return true;
    }
    if master.nullable != dest.nullable {
        return true;
    }
    if is_text_like(&master.declared_type.to_lowercase()) {
        let (effective, _) = resolve_collation(
            master.charset.as_ref(),
            master.collation.as_ref(),
            &dest_snapshot.default_charset,
            &dest_snapshot.default_collation,
        );
        if dest.charset.as_ref() != Some(&effective) {
            return true;
        }
    }
    false
}

/// Indexes compare on column order, kind and uniqueness. Key prefixes are
/// ignored on purpose: the destination's prefixes are derived from its own
/// key-length ceiling and re-deriving them every run would churn
/// Drop+Add pairs forever.
fn index_equivalent(a: &IndexDef, b: &IndexDef) -> bool {
    a.kind == b.kind && a.column_names() == b.column_names()
}
