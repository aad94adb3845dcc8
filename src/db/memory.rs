//! In-memory [`Database`] serving fixed tables.
//!
//! Used by the test suite and benchmarks to drive the dump engine without a
//! server. Row failures can be injected to exercise abort paths.

use super::{quote_identifier, ColumnInfo, Database, RowSink, SqlValue};
use crate::error::{DumpError, Result};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub name: String,
    /// Stored columns; every row holds one value per stored column
    pub columns: Vec<String>,
    /// Generated columns as `(name, expression)`, listed after the stored ones
    pub generated: Vec<(String, String)>,
    pub rows: Vec<Vec<SqlValue>>,
    create_statement: Option<String>,
}

impl MemoryTable {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            generated: Vec::new(),
            rows: Vec::new(),
            create_statement: None,
        }
    }

    pub fn with_row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn with_rows<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<SqlValue>>,
    {
        self.rows.extend(rows);
        self
    }

    /// Add a `VIRTUAL` generated column computed from `expression`
    pub fn with_generated_column(mut self, name: &str, expression: &str) -> Self {
        self.generated.push((name.to_string(), expression.to_string()));
        self
    }

    pub fn with_create_statement(mut self, ddl: &str) -> Self {
        self.create_statement = Some(ddl.to_string());
        self
    }

    /// Stored columns, then generated ones
    pub fn column_info(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .map(ColumnInfo::new)
            .chain(self.generated.iter().map(|(name, _)| ColumnInfo::generated(name)))
            .collect()
    }

    /// DDL reported for this table; every column is `text` unless a
    /// statement was supplied
    pub fn create_statement(&self) -> String {
        if let Some(ddl) = &self.create_statement {
            return ddl.clone();
        }
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("  {} text", quote_identifier(c)))
            .chain(self.generated.iter().map(|(name, expression)| {
                format!(
                    "  {} text GENERATED ALWAYS AS ({}) VIRTUAL",
                    quote_identifier(name),
                    expression
                )
            }))
            .collect();
        format!(
            "CREATE TABLE {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            quote_identifier(&self.name),
            columns.join(",\n")
        )
    }
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: Vec<MemoryTable>,
    version: Option<String>,
    fail_after: Option<(String, usize)>,
    unreachable: bool,
    closed: bool,
    closes: Arc<AtomicUsize>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Fail the cursor of `table` after `rows` rows have been delivered
    pub fn failing_after(mut self, table: &str, rows: usize) -> Self {
        self.fail_after = Some((table.to_string(), rows));
        self
    }

    /// Reject the connectivity check
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shared counter of effective `close` calls, readable after the
    /// database has been moved into the engine
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(DumpError::connection(
                "connection is closed",
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables.iter().find(|t| t.name == name).ok_or_else(|| {
            DumpError::schema_query(
                format!("table {}", quote_identifier(name)),
                io::Error::new(io::ErrorKind::NotFound, "no such table"),
            )
        })
    }
}

impl Database for MemoryDatabase {
    fn ping(&mut self) -> Result<()> {
        self.check_open()?;
        if self.unreachable {
            return Err(DumpError::connection(
                "ping",
                io::Error::from(io::ErrorKind::ConnectionRefused),
            ));
        }
        Ok(())
    }

    fn server_version(&self) -> Option<String> {
        self.version.clone()
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        self.check_open()?;
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    fn list_columns(&mut self) -> Result<Vec<(String, Vec<ColumnInfo>)>> {
        self.check_open()?;
        Ok(self
            .tables
            .iter()
            .map(|t| (t.name.clone(), t.column_info()))
            .collect())
    }

    fn create_table_statement(&mut self, table: &str) -> Result<String> {
        self.check_open()?;
        Ok(self.table(table)?.create_statement())
    }

    fn stream_rows(
        &mut self,
        table: &str,
        columns: &[String],
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        self.check_open()?;
        let source = self.table(table)?;
        let limit = match &self.fail_after {
            Some((name, rows)) if name == table => Some(*rows),
            _ => None,
        };

        // Only stored columns can be selected back into an INSERT
        let mut positions = Vec::with_capacity(columns.len());
        for column in columns {
            let Some(i) = source.columns.iter().position(|c| c == column) else {
                return Err(DumpError::row(
                    table,
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("cannot select column {}", quote_identifier(column)),
                    ),
                ));
            };
            positions.push(i);
        }

        for (i, row) in source.rows.iter().enumerate() {
            if limit == Some(i) {
                return Err(DumpError::row(
                    table,
                    io::Error::new(io::ErrorKind::InvalidData, "malformed packet"),
                ));
            }
            if i == 0 {
                sink.columns(columns)?;
            }
            sink.row(
                positions
                    .iter()
                    .map(|&p| row.get(p).cloned().unwrap_or(SqlValue::Null))
                    .collect(),
            )?;
        }

        if limit.is_some_and(|n| n >= source.rows.len()) {
            return Err(DumpError::row(
                table,
                io::Error::new(io::ErrorKind::UnexpectedEof, "connection lost"),
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect {
        columns: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
    }

    impl RowSink for Collect {
        fn columns(&mut self, names: &[String]) -> Result<()> {
            self.columns = names.to_vec();
            Ok(())
        }

        fn row(&mut self, values: Vec<SqlValue>) -> Result<()> {
            self.rows.push(values);
            Ok(())
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    fn sink() -> Collect {
        Collect {
            columns: vec![],
            rows: vec![],
        }
    }

    fn sample() -> MemoryDatabase {
        MemoryDatabase::new().with_table(
            MemoryTable::new("users", &["id", "email"])
                .with_row(vec![1i64.into(), "a@example.com".into()])
                .with_row(vec![2i64.into(), "b@example.com".into()]),
        )
    }

    #[test]
    fn test_streams_rows_in_order() {
        let mut db = sample();
        let mut sink = Collect {
            columns: vec![],
            rows: vec![],
        };
        db.stream_rows("users", &columns(&["id", "email"]), &mut sink)
            .unwrap();
        assert_eq!(sink.columns, vec!["id", "email"]);
        assert_eq!(sink.rows.len(), 2);
        assert_eq!(sink.rows[1][1], SqlValue::from("b@example.com"));
    }

    #[test]
    fn test_injected_failure() {
        let mut db = sample().failing_after("users", 1);
        let mut sink = Collect {
            columns: vec![],
            rows: vec![],
        };
        let err = db
            .stream_rows("users", &columns(&["id", "email"]), &mut sink)
            .unwrap_err();
        assert!(matches!(err, DumpError::Row { .. }));
        assert_eq!(sink.rows.len(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut db = sample();
        let closes = db.close_counter();
        db.close().unwrap();
        db.close().unwrap();
        assert!(db.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(db.list_tables().is_err());
    }

    #[test]
    fn test_unreachable_ping() {
        let mut db = sample().unreachable();
        let err = db.ping().unwrap_err();
        assert!(matches!(err, DumpError::Connection { .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_projection_follows_requested_columns() {
        let mut db = sample();
        let mut sink = sink();
        db.stream_rows("users", &columns(&["email", "id"]), &mut sink)
            .unwrap();
        assert_eq!(sink.columns, vec!["email", "id"]);
        assert_eq!(sink.rows[0], vec![SqlValue::from("a@example.com"), 1i64.into()]);
    }

    #[test]
    fn test_generated_column_is_listed_but_not_selectable() {
        let mut db = MemoryDatabase::new().with_table(
            MemoryTable::new("people", &["first", "last"])
                .with_generated_column("full_name", "concat(`first`,' ',`last`)")
                .with_row(vec!["Ada".into(), "Lovelace".into()]),
        );

        let listed = db.list_columns().unwrap();
        assert_eq!(
            listed[0].1,
            vec![
                ColumnInfo::new("first"),
                ColumnInfo::new("last"),
                ColumnInfo::generated("full_name"),
            ]
        );
        assert!(db
            .create_table_statement("people")
            .unwrap()
            .contains("`full_name` text GENERATED ALWAYS AS (concat(`first`,' ',`last`)) VIRTUAL"));

        let err = db
            .stream_rows("people", &columns(&["first", "full_name"]), &mut sink())
            .unwrap_err();
        assert!(matches!(err, DumpError::Row { .. }));
    }

    #[test]
    fn test_default_create_statement() {
        let table = MemoryTable::new("users", &["id"]);
        assert_eq!(
            table.create_statement(),
            "CREATE TABLE `users` (\n  `id` text\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        );
    }
}
