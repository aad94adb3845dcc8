//! Schema snapshot of the source database.
//!
//! Captured once per run, before any output is written:
//! - the ordered list of base tables, which fixes the dump order
//! - each table's column names in ordinal order, used to check column rules
//!   and to build the SELECT list; generated columns are kept apart

use crate::db::{ColumnInfo, Database};
use crate::error::Result;
use ahash::AHashMap;
use std::fmt;
use tracing::debug;

/// Position of a table within the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// A base table and its columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub id: TableId,
    /// Stored column names in ordinal order
    pub columns: Vec<String>,
    /// Generated column names; never selected or inserted
    pub generated: Vec<String>,
}

impl TableInfo {
    /// The stored column matching `column` (MySQL column names are
    /// case-insensitive)
    pub fn find_column(&self, column: &str) -> Option<&String> {
        self.columns.iter().find(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.find_column(column).is_some()
    }

    pub fn is_generated(&self, column: &str) -> bool {
        self.generated.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// Ordered base tables as reported by the database
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    tables: Vec<TableInfo>,
    index: AHashMap<String, TableId>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query `db` for its tables and their columns.
    ///
    /// Table order is the order of [`Database::list_tables`]; column lists
    /// for tables it did not report (views) are dropped.
    pub fn capture(db: &mut dyn Database) -> Result<Self> {
        let names = db.list_tables()?;
        let mut columns: AHashMap<String, Vec<ColumnInfo>> =
            db.list_columns()?.into_iter().collect();

        let mut snapshot = Self::new();
        for name in names {
            let table_columns = columns.remove(&name).unwrap_or_default();
            snapshot.add_table_columns(name, table_columns);
        }
        debug!(tables = snapshot.len(), "captured schema snapshot");
        Ok(snapshot)
    }

    /// Append a table, returning its ID. A repeated name replaces nothing
    /// and returns the existing ID.
    pub fn add_table(&mut self, name: String, columns: Vec<String>) -> TableId {
        self.add_table_columns(name, columns.into_iter().map(ColumnInfo::new).collect())
    }

    /// [`add_table`](Self::add_table) with generated columns flagged
    pub fn add_table_columns(&mut self, name: String, columns: Vec<ColumnInfo>) -> TableId {
        if let Some(&id) = self.index.get(&name) {
            return id;
        }
        let (generated, stored): (Vec<ColumnInfo>, Vec<ColumnInfo>) =
            columns.into_iter().partition(|c| c.generated);

        let id = TableId(self.tables.len() as u32);
        self.index.insert(name.clone(), id);
        self.tables.push(TableInfo {
            name,
            id,
            columns: stored.into_iter().map(|c| c.name).collect(),
            generated: generated.into_iter().map(|c| c.name).collect(),
        });
        id
    }

    pub fn table(&self, id: TableId) -> Option<&TableInfo> {
        self.tables.get(id.0 as usize)
    }

    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.index.get(name).and_then(|&id| self.table(id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Table names in dump order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.get_table(table).map(|t| t.columns.as_slice())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryDatabase, MemoryTable};

    #[test]
    fn test_capture_keeps_database_order() {
        let mut db = MemoryDatabase::new()
            .with_table(MemoryTable::new("zebra", &["id"]))
            .with_table(MemoryTable::new("alpha", &["id", "name"]));

        let snapshot = SchemaSnapshot::capture(&mut db).unwrap();
        let names: Vec<&str> = snapshot.table_names().collect();
        assert_eq!(names, vec!["zebra", "alpha"]);
        assert_eq!(
            snapshot.columns("alpha").unwrap(),
            &["id".to_string(), "name".to_string()]
        );
        assert_eq!(snapshot.get_table("alpha").unwrap().id, TableId(1));
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let mut snapshot = SchemaSnapshot::new();
        snapshot.add_table("users".to_string(), vec!["Email".to_string()]);
        let users = snapshot.get_table("users").unwrap();
        assert!(users.has_column("email"));
        assert!(!users.has_column("phone"));
        assert!(snapshot.get_table("USERS").is_none());
    }

    #[test]
    fn test_generated_columns_are_kept_apart() {
        let mut db = MemoryDatabase::new().with_table(
            MemoryTable::new("people", &["id", "first"])
                .with_generated_column("initial", "left(`first`,1)"),
        );

        let snapshot = SchemaSnapshot::capture(&mut db).unwrap();
        let people = snapshot.get_table("people").unwrap();
        assert_eq!(people.columns, vec!["id", "first"]);
        assert_eq!(people.generated, vec!["initial"]);
        assert!(!people.has_column("initial"));
        assert!(people.is_generated("INITIAL"));
    }

    #[test]
    fn test_repeated_table_is_not_duplicated() {
        let mut snapshot = SchemaSnapshot::new();
        let first = snapshot.add_table("t".to_string(), vec![]);
        let second = snapshot.add_table("t".to_string(), vec!["x".to_string()]);
        assert_eq!(first, second);
        assert_eq!(snapshot.len(), 1);
    }
}
