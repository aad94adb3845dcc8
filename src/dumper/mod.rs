//! Obfuscating dump engine.
//!
//! Walks the [`DumpPlan`] in schema order and, per table:
//! - ignore: writes nothing
//! - truncate: writes `DROP TABLE IF EXISTS` and the `CREATE TABLE` statement
//! - keep: writes the DDL, then every row unchanged
//! - obfuscate: writes the DDL, then every row with each ruled column
//!   replaced by its generator's next value
//!
//! Rows are streamed from the database cursor and grouped into extended
//! INSERT statements of at most `rows_per_insert` rows, so memory use does
//! not depend on table size. Any read or write error aborts the dump.

pub mod sql;

use crate::db::{Database, RowSink, SqlValue};
use crate::error::{DumpError, Result};
use crate::faker::Generator;
use crate::plan::{DumpPlan, TablePlan, TablePolicy};
use crate::writer::DumpWriter;
use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info, warn};

/// Upper bound on the text of one INSERT statement
pub const MAX_STATEMENT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub rows_per_insert: usize,
    pub max_statement_bytes: usize,
    /// Write the comment header and session settings
    pub add_header: bool,
    /// Timestamp shown in the header
    pub dumped_at: DateTime<FixedOffset>,
    pub database_name: Option<String>,
    pub host: Option<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            rows_per_insert: crate::config::DEFAULT_ROWS_PER_INSERT,
            max_statement_bytes: MAX_STATEMENT_BYTES,
            add_header: true,
            dumped_at: Utc::now().fixed_offset(),
            database_name: None,
            host: None,
        }
    }
}

/// Statistics from a dump run
#[derive(Debug, Default, Clone, Serialize)]
pub struct DumpStats {
    pub tables_kept: usize,
    pub tables_ignored: usize,
    pub tables_truncated: usize,
    pub tables_obfuscated: usize,
    /// Rows written across all tables
    pub rows_written: u64,
    /// Column values replaced by a generator
    pub values_obfuscated: u64,
    pub bytes_written: u64,
    /// Per-table statistics, in dump order
    pub table_stats: Vec<TableDumpStats>,
}

impl DumpStats {
    fn record(&mut self, table: TableDumpStats) {
        match table.policy {
            TablePolicy::Keep => self.tables_kept += 1,
            TablePolicy::Ignore => self.tables_ignored += 1,
            TablePolicy::Truncate => self.tables_truncated += 1,
            TablePolicy::Obfuscate => self.tables_obfuscated += 1,
        }
        self.rows_written += table.rows;
        self.values_obfuscated += table.values_obfuscated;
        self.table_stats.push(table);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDumpStats {
    pub name: String,
    pub policy: TablePolicy,
    pub rows: u64,
    pub values_obfuscated: u64,
}

type ProgressFn = Box<dyn Fn(usize, usize, &str)>;

/// Dump engine owning the database connection and the output stream
pub struct Dumper<D: Database, W: Write = File> {
    db: D,
    writer: DumpWriter<W>,
    plan: DumpPlan,
    options: DumpOptions,
    progress: Option<ProgressFn>,
}

impl<D: Database, W: Write> Dumper<D, W> {
    pub fn new(db: D, writer: DumpWriter<W>, plan: DumpPlan) -> Self {
        Self {
            db,
            writer,
            plan,
            options: DumpOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: DumpOptions) -> Self {
        self.options = options;
        self
    }

    /// Called after each table with `(tables done, total tables, table name)`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn plan(&self) -> &DumpPlan {
        &self.plan
    }

    /// Write the whole dump. Stops at the first error; whatever was written
    /// before it stays in the output.
    pub fn dump(&mut self) -> Result<DumpStats> {
        let Self {
            db,
            writer,
            plan,
            options,
            progress,
        } = self;

        if options.add_header {
            write_header(writer, &*db, options)?;
        }

        let total = plan.len();
        let mut stats = DumpStats::default();

        for (i, table) in plan.iter().enumerate() {
            let table_stats = dump_table(db, writer, table, options)?;
            debug!(
                table = %table.name,
                policy = %table.policy,
                rows = table_stats.rows,
                "table dumped"
            );
            stats.record(table_stats);

            if let Some(callback) = progress.as_ref() {
                callback(i + 1, total, &table.name);
            }
        }

        if options.add_header {
            write_footer(writer)?;
        }
        writer.flush()?;
        stats.bytes_written = writer.bytes_written();

        info!(
            tables = total,
            rows = stats.rows_written,
            obfuscated = stats.values_obfuscated,
            "dump finished"
        );
        Ok(stats)
    }

    /// Flush and release the output, then close the database connection.
    ///
    /// Both steps are attempted; the first failure is returned.
    pub fn close(self) -> Result<W> {
        let Self { mut db, writer, .. } = self;
        let flushed = writer.finish();
        let closed = db.close();
        let inner = flushed?;
        closed?;
        Ok(inner)
    }

    /// [`dump`](Self::dump) followed by [`close`](Self::close), which runs
    /// whether or not the dump succeeded
    pub fn run(mut self) -> Result<(DumpStats, W)> {
        let dumped = self.dump();
        let closed = self.close();

        match (dumped, closed) {
            (Ok(stats), Ok(inner)) => Ok((stats, inner)),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "release after failed dump also failed");
                Err(e)
            }
            (Ok(_), Err(e)) => Err(e),
        }
    }
}

fn write_header<W: Write>(
    writer: &mut DumpWriter<W>,
    db: &dyn Database,
    options: &DumpOptions,
) -> Result<()> {
    let mut header = format!(
        "-- {} {}\n--\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    header.push_str(&format!(
        "-- Host: {}    Database: {}\n",
        options.host.as_deref().unwrap_or("localhost"),
        options.database_name.as_deref().unwrap_or("")
    ));
    header.push_str("-- ------------------------------------------------------\n");
    if let Some(version) = db.server_version() {
        header.push_str(&format!("-- Server version\t{}\n", version));
    }
    header.push_str(&format!(
        "-- Dumped at {}\n\n",
        options.dumped_at.format("%Y-%m-%d %H:%M:%S %:z")
    ));
    writer.write_raw(&header)?;

    for stmt in sql::SESSION_PROLOGUE {
        writer.write_statement(stmt.as_bytes())?;
    }
    writer.write_raw("\n")
}

fn write_footer<W: Write>(writer: &mut DumpWriter<W>) -> Result<()> {
    for stmt in sql::SESSION_EPILOGUE {
        writer.write_statement(stmt.as_bytes())?;
    }
    writer.write_raw(&format!(
        "\n-- Dump completed at {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ))
}

fn section_comment(title: &str, table: &str) -> String {
    format!(
        "--\n-- {} for table {}\n--\n\n",
        title,
        crate::db::quote_identifier(table)
    )
}

fn dump_table<D: Database, W: Write>(
    db: &mut D,
    writer: &mut DumpWriter<W>,
    table: &TablePlan,
    options: &DumpOptions,
) -> Result<TableDumpStats> {
    let mut stats = TableDumpStats {
        name: table.name.clone(),
        policy: table.policy,
        rows: 0,
        values_obfuscated: 0,
    };

    if !table.dumps_schema() {
        return Ok(stats);
    }

    let ddl = db.create_table_statement(&table.name)?;
    writer.write_raw(&section_comment("Table structure", &table.name))?;
    writer.write_statement(sql::drop_table(&table.name).as_bytes())?;
    writer.write_statement(format!("{};", ddl.trim_end().trim_end_matches(';')).as_bytes())?;
    writer.write_raw("\n")?;

    if !table.dumps_rows() {
        return Ok(stats);
    }

    writer.write_raw(&section_comment("Dumping data", &table.name))?;
    writer.write_statement(sql::lock_table(&table.name).as_bytes())?;
    writer.write_statement(sql::disable_keys(&table.name).as_bytes())?;

    let mut emitter = TableEmitter::new(writer, table, options);
    db.stream_rows(&table.name, &table.columns, &mut emitter)?;
    emitter.finish()?;
    stats.rows = emitter.rows;
    stats.values_obfuscated = emitter.replaced;

    writer.write_statement(sql::enable_keys(&table.name).as_bytes())?;
    writer.write_statement(sql::UNLOCK_TABLES.as_bytes())?;
    writer.write_raw("\n")?;

    Ok(stats)
}

/// Receives one table's rows, applies the column rules and batches the
/// rows into extended INSERT statements
struct TableEmitter<'a, W: Write> {
    writer: &'a mut DumpWriter<W>,
    table: &'a TablePlan,
    rows_per_insert: usize,
    max_statement_bytes: usize,
    /// Column position and generator of each rule, resolved on `columns`
    rules: Vec<(usize, &'a Generator)>,
    prefix: String,
    pending: String,
    pending_rows: usize,
    row_buf: String,
    rows: u64,
    replaced: u64,
}

impl<'a, W: Write> TableEmitter<'a, W> {
    fn new(writer: &'a mut DumpWriter<W>, table: &'a TablePlan, options: &DumpOptions) -> Self {
        Self {
            writer,
            table,
            rows_per_insert: options.rows_per_insert.max(1),
            max_statement_bytes: options.max_statement_bytes,
            rules: Vec::new(),
            prefix: String::new(),
            pending: String::new(),
            pending_rows: 0,
            row_buf: String::new(),
            rows: 0,
            replaced: 0,
        }
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending_rows == 0 {
            return Ok(());
        }
        self.pending.push(';');
        self.writer.write_statement(self.pending.as_bytes())?;
        self.pending.clear();
        self.pending_rows = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_pending()
    }

    fn missing_column(&self, column: &str) -> DumpError {
        DumpError::row(
            self.table.name.as_str(),
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("column `{}` is not in the result set", column),
            ),
        )
    }
}

impl<'a, W: Write> RowSink for TableEmitter<'a, W> {
    fn columns(&mut self, names: &[String]) -> Result<()> {
        self.prefix = sql::insert_prefix(&self.table.name, names);

        let table: &'a TablePlan = self.table;
        let mut rules = Vec::with_capacity(table.rules.len());
        for rule in &table.rules {
            let Some(index) = names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(&rule.column))
            else {
                return Err(self.missing_column(&rule.column));
            };
            rules.push((index, &rule.generator));
        }
        self.rules = rules;
        Ok(())
    }

    fn row(&mut self, mut values: Vec<SqlValue>) -> Result<()> {
        for (i, &(index, generator)) in self.rules.iter().enumerate() {
            let Some(value) = values.get_mut(index) else {
                return Err(self.missing_column(&self.table.rules[i].column));
            };
            *value = SqlValue::Text(generator.next_value());
            self.replaced += 1;
        }

        self.row_buf.clear();
        sql::push_tuple(&mut self.row_buf, &values);

        if self.pending_rows > 0
            && self.pending.len() + 1 + self.row_buf.len() + 1 > self.max_statement_bytes
        {
            self.flush_pending()?;
        }

        if self.pending_rows == 0 {
            self.pending.push_str(&self.prefix);
        } else {
            self.pending.push(',');
        }
        self.pending.push_str(&self.row_buf);
        self.pending_rows += 1;
        self.rows += 1;

        if self.pending_rows >= self.rows_per_insert {
            self.flush_pending()?;
        }
        Ok(())
    }
}
