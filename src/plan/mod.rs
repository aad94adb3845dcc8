//! Dump plan: the resolved policy and column rules of every table.
//!
//! The [`Resolver`] validates the `tables` section of the configuration and,
//! together with the [`SchemaSnapshot`](crate::schema::SchemaSnapshot),
//! builds a [`DumpPlan`]. The plan is immutable once built and iterates
//! tables in schema order.

mod resolver;

pub use resolver::Resolver;

use crate::faker::Generator;
use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// How a table is treated in the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TablePolicy {
    /// Schema and rows, unmodified
    Keep,
    /// Nothing at all
    Ignore,
    /// Schema only
    Truncate,
    /// Schema and rows, with ruled columns replaced
    Obfuscate,
}

impl fmt::Display for TablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TablePolicy::Keep => write!(f, "keep"),
            TablePolicy::Ignore => write!(f, "ignore"),
            TablePolicy::Truncate => write!(f, "truncate"),
            TablePolicy::Obfuscate => write!(f, "obfuscate"),
        }
    }
}

/// Replacement rule for one column of an obfuscated table
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRule {
    pub table: String,
    /// Column name as the database reports it
    pub column: String,
    pub generator: Generator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePlan {
    pub name: String,
    pub policy: TablePolicy,
    /// Stored columns selected for the INSERT statements, in ordinal order
    pub columns: Vec<String>,
    /// Empty unless the policy is [`TablePolicy::Obfuscate`]
    pub rules: Vec<ColumnRule>,
}

impl TablePlan {
    /// Whether the table's rows are written
    pub fn dumps_rows(&self) -> bool {
        matches!(self.policy, TablePolicy::Keep | TablePolicy::Obfuscate)
    }

    /// Whether the table's DDL is written
    pub fn dumps_schema(&self) -> bool {
        self.policy != TablePolicy::Ignore
    }
}

/// Immutable mapping from table name to its plan, in schema order
#[derive(Debug, Clone, Default)]
pub struct DumpPlan {
    tables: Vec<TablePlan>,
    index: AHashMap<String, usize>,
}

impl DumpPlan {
    pub(crate) fn from_tables(tables: Vec<TablePlan>) -> Self {
        let index = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self { tables, index }
    }

    pub fn get(&self, table: &str) -> Option<&TablePlan> {
        self.index.get(table).map(|&i| &self.tables[i])
    }

    pub fn policy(&self, table: &str) -> Option<TablePolicy> {
        self.get(table).map(|t| t.policy)
    }

    pub fn tables(&self) -> &[TablePlan] {
        &self.tables
    }

    pub fn iter(&self) -> impl Iterator<Item = &TablePlan> {
        self.tables.iter()
    }

    /// Number of tables resolved to `policy`
    pub fn count(&self, policy: TablePolicy) -> usize {
        self.tables.iter().filter(|t| t.policy == policy).count()
    }

    /// Total number of column rules across all tables
    pub fn rule_count(&self) -> usize {
        self.tables.iter().map(|t| t.rules.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// A group of table names checked for duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Keep,
    Ignore,
    Truncate,
    Obfuscate,
    /// Union of the four sections
    Overall,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Keep => write!(f, "keep"),
            Section::Ignore => write!(f, "ignore"),
            Section::Truncate => write!(f, "truncate"),
            Section::Obfuscate => write!(f, "obfuscate"),
            Section::Overall => write!(f, "overall"),
        }
    }
}

/// Duplicated table names per section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    sections: BTreeMap<Section, Vec<String>>,
}

impl DuplicateReport {
    pub(crate) fn insert(&mut self, section: Section, names: Vec<String>) {
        if !names.is_empty() {
            self.sections.insert(section, names);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Duplicated names listed under `section`, in first-appearance order
    pub fn names(&self, section: Section) -> &[String] {
        self.sections
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &[String])> {
        self.sections.iter().map(|(s, names)| (*s, names.as_slice()))
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .iter()
            .map(|(section, names)| format!("  {}: {}", section, names.join(", ")))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// A column rule that cannot be turned into a generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRule {
    pub table: String,
    pub column: String,
    pub reason: String,
}

impl fmt::Display for UnresolvedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.table, self.column, self.reason)
    }
}
