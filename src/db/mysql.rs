//! MySQL backend built on `mysql_async`.
//!
//! The dump is strictly sequential, so the async client is driven by a
//! private current-thread runtime and every call blocks until it completes.

use super::{quote_identifier, select_columns, ColumnInfo, Database, RowSink, SqlValue};
use crate::config::{DatabaseConfig, NetKind};
use crate::error::{DumpError, Result};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Column, Conn, OptsBuilder, Row, Value};
use tokio::runtime::Runtime;
use tracing::debug;

/// Character set id MySQL reports for binary columns
const BINARY_CHARSET: u16 = 63;

/// Run on every new connection. `TIMESTAMP` values are then read in UTC,
/// matching the `TIME_ZONE='+00:00'` the dump sets before restoring them.
pub const SESSION_INIT: &[&str] = &["SET time_zone = '+00:00'"];

pub struct MySqlDatabase {
    runtime: Runtime,
    conn: Option<Conn>,
}

impl MySqlDatabase {
    /// Open a connection described by `config`
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DumpError::connection("starting database runtime", e))?;

        debug!(dsn = %config.redacted_dsn(), "connecting to database");
        let conn = runtime
            .block_on(Conn::new(connect_opts(config)))
            .map_err(|e| {
                DumpError::connection(format!("connecting to {}", config.redacted_dsn()), e)
            })?;

        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    fn parts(&mut self) -> Result<(&Runtime, &mut Conn)> {
        let Self { runtime, conn } = self;
        let conn = conn.as_mut().ok_or_else(|| {
            DumpError::connection(
                "connection is closed",
                std::io::Error::from(std::io::ErrorKind::NotConnected),
            )
        })?;
        Ok((&*runtime, conn))
    }
}

/// Driver options equivalent to [`DatabaseConfig::dsn`]
pub fn connect_opts(config: &DatabaseConfig) -> OptsBuilder {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    let builder = OptsBuilder::default()
        .user(non_empty(&config.user))
        .pass(non_empty(&config.password))
        .db_name(non_empty(&config.database_name))
        .init(SESSION_INIT.to_vec())
        .prefer_socket(false);

    match config.net {
        NetKind::Tcp => builder
            .ip_or_hostname(config.hostname.clone())
            .tcp_port(if config.port == 0 { 3306 } else { config.port }),
        NetKind::Unix => builder.socket(non_empty(&config.socket)),
    }
}

impl Database for MySqlDatabase {
    fn ping(&mut self) -> Result<()> {
        let (runtime, conn) = self.parts()?;
        runtime
            .block_on(conn.ping())
            .map_err(|e| DumpError::connection("ping", e))
    }

    fn server_version(&self) -> Option<String> {
        self.conn.as_ref().map(|conn| {
            let (major, minor, patch) = conn.server_version();
            format!("{}.{}.{}", major, minor, patch)
        })
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        let (runtime, conn) = self.parts()?;
        let rows: Vec<(String, String)> = runtime
            .block_on(conn.query("SHOW FULL TABLES"))
            .map_err(|e| DumpError::schema_query("SHOW FULL TABLES", e))?;

        Ok(rows
            .into_iter()
            .filter(|(_, kind)| kind.eq_ignore_ascii_case("BASE TABLE"))
            .map(|(name, _)| name)
            .collect())
    }

    fn list_columns(&mut self) -> Result<Vec<(String, Vec<ColumnInfo>)>> {
        let query = "
            SELECT TABLE_NAME, COLUMN_NAME, EXTRA
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE()
            ORDER BY TABLE_NAME, ORDINAL_POSITION";

        let (runtime, conn) = self.parts()?;
        let rows: Vec<(String, String, String)> = runtime
            .block_on(conn.query(query))
            .map_err(|e| DumpError::schema_query("listing columns", e))?;

        let mut tables: Vec<(String, Vec<ColumnInfo>)> = Vec::new();
        for (table, name, extra) in rows {
            let column = ColumnInfo {
                name,
                generated: is_generated_column(&extra),
            };
            match tables.last_mut() {
                Some((current, columns)) if *current == table => columns.push(column),
                _ => tables.push((table, vec![column])),
            }
        }
        Ok(tables)
    }

    fn create_table_statement(&mut self, table: &str) -> Result<String> {
        let query = format!("SHOW CREATE TABLE {}", quote_identifier(table));
        let (runtime, conn) = self.parts()?;
        let row: Option<(String, String)> = runtime
            .block_on(conn.query_first(query.as_str()))
            .map_err(|e| DumpError::schema_query(query.clone(), e))?;

        row.map(|(_, ddl)| ddl).ok_or_else(|| {
            DumpError::schema_query(query, std::io::Error::other("no CREATE TABLE returned"))
        })
    }

    fn stream_rows(
        &mut self,
        table: &str,
        columns: &[String],
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        if columns.is_empty() {
            debug!(table, "no stored columns to select");
            return Ok(());
        }
        let query = select_columns(table, columns);
        let (runtime, conn) = self.parts()?;

        runtime.block_on(async {
            let mut result = conn
                .query_iter(query)
                .await
                .map_err(|e| DumpError::row(table, e))?;

            let mut announced = false;
            while let Some(row) = result.next().await.map_err(|e| DumpError::row(table, e))? {
                if !announced {
                    let names: Vec<String> = row
                        .columns_ref()
                        .iter()
                        .map(|c| c.name_str().into_owned())
                        .collect();
                    sink.columns(&names)?;
                    announced = true;
                }
                sink.row(decode_row(row))?;
            }
            Ok::<_, DumpError>(())
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            debug!("closing database connection");
            self.runtime
                .block_on(conn.disconnect())
                .map_err(|e| DumpError::connection("disconnect", e))?;
        }
        Ok(())
    }
}

/// `EXTRA` of a `VIRTUAL GENERATED` or `STORED GENERATED` column.
/// `DEFAULT_GENERATED` (an expression default) is an ordinary column.
fn is_generated_column(extra: &str) -> bool {
    let extra = extra.to_ascii_uppercase();
    extra.contains("VIRTUAL GENERATED") || extra.contains("STORED GENERATED")
}

fn decode_row(mut row: Row) -> Vec<SqlValue> {
    let columns = row.columns();
    (0..columns.len())
        .map(|i| {
            let value = row.take::<Value, usize>(i).unwrap_or(Value::NULL);
            decode_value(value, &columns[i])
        })
        .collect()
}

fn is_numeric(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_LONGLONG
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_FLOAT
            | ColumnType::MYSQL_TYPE_DOUBLE
            | ColumnType::MYSQL_TYPE_DECIMAL
            | ColumnType::MYSQL_TYPE_NEWDECIMAL
            | ColumnType::MYSQL_TYPE_YEAR
    )
}

fn is_string_like(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_BLOB
    )
}

/// Decode a text-protocol value using the column metadata
fn decode_value(value: Value, column: &Column) -> SqlValue {
    let column_type = column.column_type();
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(n) => SqlValue::Number(n.to_string()),
        Value::UInt(n) => SqlValue::Number(n.to_string()),
        Value::Float(n) => SqlValue::Number(n.to_string()),
        Value::Double(n) => SqlValue::Number(n.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut s = format!("{:04}-{:02}-{:02}", year, month, day);
            if column_type != ColumnType::MYSQL_TYPE_DATE {
                s.push_str(&format!(" {:02}:{:02}:{:02}", hour, minute, second));
                if micros > 0 {
                    s.push_str(&format!(".{:06}", micros));
                }
            }
            SqlValue::Text(s)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let mut s = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if micros > 0 {
                s.push_str(&format!(".{:06}", micros));
            }
            SqlValue::Text(s)
        }
        Value::Bytes(bytes) if is_numeric(column_type) => {
            SqlValue::Number(String::from_utf8_lossy(&bytes).into_owned())
        }
        Value::Bytes(bytes)
            if column_type == ColumnType::MYSQL_TYPE_BIT
                || column_type == ColumnType::MYSQL_TYPE_GEOMETRY
                || (is_string_like(column_type) && column.character_set() == BINARY_CHARSET) =>
        {
            SqlValue::Bytes(bytes)
        }
        Value::Bytes(bytes) => SqlValue::from_bytes(bytes),
    }
}
