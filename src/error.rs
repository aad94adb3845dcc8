//! Error taxonomy for the dump pipeline.
//!
//! Every failure is fatal. Variants are grouped into four classes (see
//! [`ErrorClass`]) and each maps onto a distinct process exit code.

use crate::plan::{DuplicateReport, UnresolvedRule};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error from a database driver or an in-memory backend
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a [`DumpError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Invalid or inconsistent configuration, found before any dump output
    Configuration,
    /// Database unreachable, rejected credentials, or schema query failed
    Connectivity,
    /// Output directory or file problems, including mid-dump write failures
    Io,
    /// Row fetch or decode failure while streaming a table
    Row,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Configuration => write!(f, "configuration error"),
            ErrorClass::Connectivity => write!(f, "connectivity error"),
            ErrorClass::Io => write!(f, "I/O error"),
            ErrorClass::Row => write!(f, "row error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("config file does not exist: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("config file contains invalid markup: {message}")]
    ConfigMarkup { message: String },

    #[error("duplicated table names in config:\n{report}")]
    DuplicateTables { report: DuplicateReport },

    #[error("unresolved obfuscation rules:\n{}", format_unresolved(rules))]
    UnresolvedRules { rules: Vec<UnresolvedRule> },

    #[error(
        "database tables and configured tables differ\n  missing in config: {}\n  missing in database: {}",
        format_names(missing_in_config),
        format_names(missing_in_schema)
    )]
    TableSetMismatch {
        missing_in_config: Vec<String>,
        missing_in_schema: Vec<String>,
    },

    #[error("table '{table}' has no policy assigned in config")]
    UncoveredTable { table: String },

    #[error("database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("schema query failed: {context}")]
    SchemaQuery {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("could not create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dump '{}' already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("write to dump failed: {context}")]
    Write {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reading rows of table '{table}' failed")]
    Row {
        table: String,
        #[source]
        source: BoxError,
    },
}

impl DumpError {
    pub fn connection(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DumpError::Connection {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn schema_query(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DumpError::SchemaQuery {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn write(context: impl Into<String>, source: std::io::Error) -> Self {
        DumpError::Write {
            context: context.into(),
            source,
        }
    }

    pub fn row(table: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DumpError::Row {
            table: table.into(),
            source: source.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DumpError::ConfigNotFound { .. }
            | DumpError::ConfigMarkup { .. }
            | DumpError::DuplicateTables { .. }
            | DumpError::UnresolvedRules { .. }
            | DumpError::TableSetMismatch { .. }
            | DumpError::UncoveredTable { .. } => ErrorClass::Configuration,
            DumpError::Connection { .. } | DumpError::SchemaQuery { .. } => {
                ErrorClass::Connectivity
            }
            DumpError::OutputDirectory { .. }
            | DumpError::AlreadyExists { .. }
            | DumpError::Write { .. } => ErrorClass::Io,
            DumpError::Row { .. } => ErrorClass::Row,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            DumpError::ConfigNotFound { .. } => 1,
            DumpError::ConfigMarkup { .. } => 2,
            DumpError::OutputDirectory { .. } => 3,
            DumpError::Connection { .. } => 4,
            DumpError::AlreadyExists { .. } | DumpError::Write { .. } => 5,
            DumpError::DuplicateTables { .. } => 6,
            DumpError::SchemaQuery { .. } => 7,
            DumpError::TableSetMismatch { .. } | DumpError::UncoveredTable { .. } => 8,
            DumpError::UnresolvedRules { .. } => 9,
            DumpError::Row { .. } => 10,
        }
    }
}

pub type Result<T> = std::result::Result<T, DumpError>;

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

fn format_unresolved(rules: &[UnresolvedRule]) -> String {
    rules
        .iter()
        .map(|r| format!("  - {}", r))
        .collect::<Vec<_>>()
        .join("\n")
}
