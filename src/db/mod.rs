//! Database access used by the dump engine.
//!
//! The engine only needs a handful of operations: a connectivity check,
//! the table and column lists, each table's DDL, and a row cursor per table.
//! [`Database`] captures those; [`mysql::MySqlDatabase`] talks to a live
//! server and [`memory::MemoryDatabase`] serves fixed tables from memory.

pub mod memory;
pub mod mysql;
mod value;

pub use value::SqlValue;

use crate::error::Result;

/// A column as the database reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// `VIRTUAL` or `STORED` generated column. Its value is computed by the
    /// server, so it is never selected or inserted.
    pub generated: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generated: false,
        }
    }

    pub fn generated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generated: true,
        }
    }
}

/// Receives the rows of one table, in cursor order.
///
/// `columns` is called once, before the first row, and not at all for an
/// empty table. Returning an error from either method stops the cursor and
/// the error is passed back to the caller of [`Database::stream_rows`].
pub trait RowSink {
    fn columns(&mut self, names: &[String]) -> Result<()>;
    fn row(&mut self, values: Vec<SqlValue>) -> Result<()>;
}

/// A single, exclusively owned database connection
pub trait Database {
    /// Verify the server is reachable and the credentials are accepted
    fn ping(&mut self) -> Result<()>;

    /// Server version string for the dump header, if known
    fn server_version(&self) -> Option<String>;

    /// Base table names in the order the server reports them
    fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Columns of every base table, in ordinal order
    fn list_columns(&mut self) -> Result<Vec<(String, Vec<ColumnInfo>)>>;

    /// `CREATE TABLE` statement for `table`, without a trailing semicolon
    fn create_table_statement(&mut self, table: &str) -> Result<String>;

    /// Stream `columns` of every row of `table` into `sink`, one row at a
    /// time. The result set has exactly these columns, in this order.
    fn stream_rows(
        &mut self,
        table: &str,
        columns: &[String],
        sink: &mut dyn RowSink,
    ) -> Result<()>;

    /// Release the connection. Further calls are no-ops.
    fn close(&mut self) -> Result<()>;
}

/// Quote a MySQL identifier with backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `SELECT `a`,`b` FROM `t``
pub fn select_columns(table: &str, columns: &[String]) -> String {
    let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    format!(
        "SELECT {} FROM {}",
        columns.join(","),
        quote_identifier(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("odd`name"), "`odd``name`");
    }

    #[test]
    fn test_select_lists_columns() {
        assert_eq!(
            select_columns("users", &["id".to_string(), "e`mail".to_string()]),
            "SELECT `id`,`e``mail` FROM `users`"
        );
    }
}
