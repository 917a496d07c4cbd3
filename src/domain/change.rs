//! Structural changes computed by the differ.
//!
//! Each `ChangeOp` carries enough data to be rendered to DDL on its own;
//! the generator turns them into SQL text at the last moment, which keeps
//! the diff logic unit-testable without a live database.

use serde::{Deserialize, Serialize};

use crate::domain::schema::{ColumnDef, IndexDef, RoutineDef, RoutineKind, TableDef};

/// One structural change from master to destination.
///
/// There is deliberately no `ModifyIndex`: index changes are always a
/// `DropIndex` + `AddIndex` pair to avoid partial-state ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeOp {
    CreateTable(TableDef),
    DropTable {
        table: String,
    },
    AddColumn {
        table: String,
        column: ColumnDef,
    },
    ModifyColumn {
        table: String,
        column: ColumnDef,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AddIndex {
        table: String,
        index: IndexDef,
    },
    DropIndex {
        table: String,
        index: String,
    },
    CreateRoutine(RoutineDef),
    DropRoutine {
        name: String,
        kind: RoutineKind,
    },
}

impl ChangeOp {
    /// Short label for logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeOp::CreateTable(_) => "create_table",
            ChangeOp::DropTable { .. } => "drop_table",
            ChangeOp::AddColumn { .. } => "add_column",
            ChangeOp::ModifyColumn { .. } => "modify_column",
            ChangeOp::DropColumn { .. } => "drop_column",
            ChangeOp::AddIndex { .. } => "add_index",
            ChangeOp::DropIndex { .. } => "drop_index",
            ChangeOp::CreateRoutine(_) => "create_routine",
            ChangeOp::DropRoutine { .. } => "drop_routine",
        }
    }
}

/// Ordered sequence of changes for one destination.
///
/// Ordering invariants (maintained by the differ, relied on by the
/// generator): table creations precede operations on tables that did not
/// previously exist; index drops precede the adds that replace them;
/// routine creation comes after every table exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub ops: Vec<ChangeOp>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Count of ops matching a label, for summaries and tests.
    pub fn count_of(&self, label: &str) -> usize {
        self.ops.iter().filter(|op| op.label() == label).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_reports_empty() {
        let d = SchemaDiff::default();
        assert!(d.is_empty());
        assert_eq!(d.len(), 0);
    }

    #[test]
    fn count_of_filters_by_label() {
        let d = SchemaDiff {
            ops: vec![
                ChangeOp::DropTable {
                    table: "a".into(),
                },
                ChangeOp::DropIndex {
                    table: "a".into(),
                    index: "i".into(),
                },
                ChangeOp::DropTable {
                    table: "b".into(),
                },
            ],
        };
        assert_eq!(d.count_of("drop_table"), 2);
        assert_eq!(d.count_of("drop_index"), 1);
        assert_eq!(d.count_of("add_column"), 0);
    }
}
