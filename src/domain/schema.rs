//! Normalized in-memory representation of a database schema.
//!
//! Produced fresh by the introspector for each database in a run, immutable
//! once built, discarded afterwards. The master snapshot is shared read-only
//! across destination workers via `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::value_objects::{Charset, Collation};

/// Reserved index name MySQL uses for the primary key.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

/// Everything we know about one database: tables plus triggers and stored
/// routines, keyed by name, and the database-level charset/collation
/// defaults the normalizer falls back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Database (schema) name this snapshot was read from.
    pub database: String,
    /// Table name → definition. BTreeMap keeps iteration order stable.
    pub tables: BTreeMap<String, TableDef>,
    /// Routine name → definition (triggers, procedures, functions).
    pub routines: BTreeMap<String, RoutineDef>,
    /// Database default character set.
    pub default_charset: Charset,
    /// Database default collation.
    pub default_collation: Collation,
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }
}

/// Table definition.
///
/// Column order matters: it defines creation order and the append position
/// for columns added in update mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    /// Table-level character set, when reported.
    pub charset: Option<Charset>,
    /// Table-level collation, when reported.
    pub collation: Option<Collation>,
    /// Storage engine name, e.g. `InnoDB`.
    pub engine: Option<String>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key(&self) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Every index except the primary key.
    pub fn secondary_indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.indexes.iter().filter(|i| i.kind != IndexKind::Primary)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Column definition.
///
/// `declared_type` is preserved verbatim from `information_schema` (e.g.
/// `varchar(255)`, never normalized here) so that real type drift is
/// distinguishable from cosmetic differences. The differ case-folds when
/// comparing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// Only meaningful for text types.
    pub charset: Option<Charset>,
    pub collation: Option<Collation>,
    pub auto_increment: bool,
    /// 1-based position within the table.
    pub ordinal: u32,
}

/// One column entry of an index, with its optional key-prefix length
/// (MySQL `SUB_PART`) in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub prefix: Option<u32>,
}

impl IndexColumn {
    pub fn full(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Primary,
    Unique,
    Plain,
    Fulltext,
}

/// Index definition.
///
/// Invariant: an index of kind `Primary` is named [`PRIMARY_KEY_NAME`] and
/// a table has at most one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub kind: IndexKind,
}

impl IndexDef {
    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IndexKind::Primary | IndexKind::Unique)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineKind {
    Trigger,
    Procedure,
    Function,
}

impl RoutineKind {
    /// Keyword used in DROP statements.
    pub fn keyword(&self) -> &'static str {
        match self {
            RoutineKind::Trigger => "TRIGGER",
            RoutineKind::Procedure => "PROCEDURE",
            RoutineKind::Function => "FUNCTION",
        }
    }
}

/// Trigger or stored routine, kept as its raw CREATE statement.
///
/// The body is replayed verbatim on the destination; we only ever
/// drop-and-recreate, never rewrite routine bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineDef {
    pub name: String,
    pub kind: RoutineKind,
    /// Full CREATE statement text.
    pub definition: String,
    /// Defining table, for triggers only.
    pub table: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: &str) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            declared_type: ty.to_string(),
            nullable: true,
            default: None,
            charset: None,
            collation: None,
            auto_increment: false,
            ordinal: 1,
        }
    }

    fn table_with_pk() -> TableDef {
        TableDef {
            name: "users".into(),
            columns: vec![col("id", "int"), col("name", "varchar(100)")],
            indexes: vec![
                IndexDef {
                    name: PRIMARY_KEY_NAME.into(),
                    columns: vec![IndexColumn::full("id")],
                    kind: IndexKind::Primary,
                },
                IndexDef {
                    name: "idx_name".into(),
                    columns: vec![IndexColumn::full("name")],
                    kind: IndexKind::Plain,
                },
            ],
            charset: None,
            collation: None,
            engine: Some("InnoDB".into()),
        }
    }

    #[test]
    fn primary_key_is_found_by_kind() {
        let t = table_with_pk();
        assert_eq!(t.primary_key().unwrap().name, PRIMARY_KEY_NAME);
    }

    #[test]
    fn secondary_indexes_exclude_primary() {
        let t = table_with_pk();
        let names: Vec<&str> = t.secondary_indexes().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["idx_name"]);
    }

    #[test]
    fn column_lookup_by_name() {
        let t = table_with_pk();
        assert!(t.column("name").is_some());
        assert!(t.column("email").is_none());
    }

    #[test]
    fn unique_covers_primary_and_unique_kinds() {
        let mut idx = IndexDef {
            name: "u".into(),
            columns: vec![IndexColumn::full("a")],
            kind: IndexKind::Unique,
        };
        assert!(idx.is_unique());
        idx.kind = IndexKind::Fulltext;
        assert!(!idx.is_unique());
    }
}
