use super::{
    ColumnRule, DumpPlan, DuplicateReport, Section, TablePlan, TablePolicy, UnresolvedRule,
};
use crate::config::TablesConfig;
use crate::error::{DumpError, Result};
use crate::faker::Generator;
use crate::schema::SchemaSnapshot;
use ahash::{AHashMap, AHashSet};
use tracing::debug;

/// Validates the `tables` configuration and resolves table policies.
///
/// Holds no state besides the borrowed configuration, so every check can
/// be repeated with the same result.
pub struct Resolver<'a> {
    tables: &'a TablesConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(tables: &'a TablesConfig) -> Self {
        Self { tables }
    }

    fn sections(&self) -> [(Section, Vec<&'a str>); 4] {
        let tables = self.tables;
        [
            (Section::Keep, tables.keep.iter().map(String::as_str).collect()),
            (Section::Ignore, tables.ignore.iter().map(String::as_str).collect()),
            (
                Section::Truncate,
                tables.truncate.iter().map(String::as_str).collect(),
            ),
            (Section::Obfuscate, tables.obfuscate.keys().collect()),
        ]
    }

    /// Find table names declared more than once, within one section or
    /// across sections.
    ///
    /// A duplicated name is listed under every section it appears in and
    /// under [`Section::Overall`].
    pub fn validate_table_sets(&self) -> DuplicateReport {
        let sections = self.sections();

        let mut occurrences: AHashMap<&str, usize> = AHashMap::new();
        for (_, names) in &sections {
            for name in names {
                *occurrences.entry(name).or_insert(0) += 1;
            }
        }
        let duplicated = |name: &&str| occurrences.get(name).is_some_and(|&n| n > 1);

        let mut report = DuplicateReport::default();
        let mut overall = Vec::new();
        for (section, names) in &sections {
            let found = unique_in_order(names.iter().copied().filter(duplicated));
            for name in &found {
                if !overall.contains(name) {
                    overall.push(name.clone());
                }
            }
            report.insert(*section, found);
        }
        report.insert(Section::Overall, overall);
        report
    }

    /// [`validate_table_sets`](Self::validate_table_sets) as a `Result`
    pub fn check_table_sets(&self) -> Result<()> {
        let report = self.validate_table_sets();
        if report.has_errors() {
            return Err(DumpError::DuplicateTables { report });
        }
        Ok(())
    }

    /// Decode every column rule of the obfuscate section, returning the
    /// ones that do not describe a known generator with valid parameters.
    pub fn validate_obfuscate_section(&self) -> Vec<UnresolvedRule> {
        let mut unresolved = Vec::new();
        for (table, rules) in self.tables.obfuscate.iter() {
            let Some(rules) = rules else { continue };
            let mut seen: AHashSet<String> = AHashSet::new();
            for (column, rule) in rules.iter() {
                let reason = if !seen.insert(column.to_ascii_lowercase()) {
                    Some("column declared more than once".to_string())
                } else {
                    Generator::from_rule(rule).err().map(|e| e.to_string())
                };
                if let Some(reason) = reason {
                    unresolved.push(UnresolvedRule {
                        table: table.to_string(),
                        column: column.to_string(),
                        reason,
                    });
                }
            }
        }
        unresolved
    }

    /// [`validate_obfuscate_section`](Self::validate_obfuscate_section) as a `Result`
    pub fn check_obfuscate_section(&self) -> Result<()> {
        let rules = self.validate_obfuscate_section();
        if !rules.is_empty() {
            return Err(DumpError::UnresolvedRules { rules });
        }
        Ok(())
    }

    /// Policy of `table`: ignore, then truncate, then obfuscate (when the
    /// table has at least one column rule), then keep.
    pub fn resolve_policy(&self, table: &str) -> Result<TablePolicy> {
        let tables = self.tables;
        let listed = |names: &[String]| names.iter().any(|n| n == table);

        if listed(&tables.ignore) {
            Ok(TablePolicy::Ignore)
        } else if listed(&tables.truncate) {
            Ok(TablePolicy::Truncate)
        } else if tables.obfuscate.contains_key(table) {
            if self.rule_entries(table).next().is_some() {
                Ok(TablePolicy::Obfuscate)
            } else {
                Ok(TablePolicy::Keep)
            }
        } else if listed(&tables.keep) {
            Ok(TablePolicy::Keep)
        } else {
            Err(DumpError::UncoveredTable {
                table: table.to_string(),
            })
        }
    }

    fn rule_entries(&self, table: &str) -> impl Iterator<Item = (&'a str, &'a serde_yaml_ng::Value)> {
        let tables: &'a TablesConfig = self.tables;
        tables
            .obfuscate
            .get(table)
            .and_then(Option::as_ref)
            .into_iter()
            .flat_map(|rules| rules.iter())
    }

    /// Build the dump plan for `schema`.
    ///
    /// Re-runs both configuration checks, then requires the configured
    /// tables and the schema's tables to be the same set, and every column
    /// rule to name an existing stored column.
    pub fn build_plan(&self, schema: &SchemaSnapshot) -> Result<DumpPlan> {
        self.check_table_sets()?;
        self.check_obfuscate_section()?;

        let declared: Vec<&str> = self
            .sections()
            .into_iter()
            .flat_map(|(_, names)| names)
            .collect();

        let missing_in_config: Vec<String> = schema
            .table_names()
            .filter(|name| !declared.contains(name))
            .map(str::to_string)
            .collect();
        let missing_in_schema: Vec<String> = declared
            .iter()
            .filter(|name| !schema.contains(name))
            .map(|name| name.to_string())
            .collect();

        if !missing_in_config.is_empty() || !missing_in_schema.is_empty() {
            return Err(DumpError::TableSetMismatch {
                missing_in_config,
                missing_in_schema,
            });
        }

        let mut unresolved = Vec::new();
        let mut tables = Vec::with_capacity(schema.len());

        for info in schema.iter() {
            let policy = self.resolve_policy(&info.name)?;
            let mut rules = Vec::new();

            if policy == TablePolicy::Obfuscate {
                for (column, rule) in self.rule_entries(&info.name) {
                    if info.is_generated(column) {
                        unresolved.push(UnresolvedRule {
                            table: info.name.clone(),
                            column: column.to_string(),
                            reason: "generated column cannot be obfuscated".to_string(),
                        });
                        continue;
                    }
                    let Some(actual) = info.find_column(column) else {
                        unresolved.push(UnresolvedRule {
                            table: info.name.clone(),
                            column: column.to_string(),
                            reason: "no such column in table".to_string(),
                        });
                        continue;
                    };
                    match Generator::from_rule(rule) {
                        Ok(generator) => rules.push(ColumnRule {
                            table: info.name.clone(),
                            column: actual.clone(),
                            generator,
                        }),
                        Err(e) => unresolved.push(UnresolvedRule {
                            table: info.name.clone(),
                            column: column.to_string(),
                            reason: e.to_string(),
                        }),
                    }
                }
            }

            debug!(table = %info.name, %policy, rules = rules.len(), "resolved table");
            tables.push(TablePlan {
                name: info.name.clone(),
                policy,
                columns: info.columns.clone(),
                rules,
            });
        }

        if !unresolved.is_empty() {
            return Err(DumpError::UnresolvedRules { rules: unresolved });
        }

        Ok(DumpPlan::from_tables(tables))
    }
}

fn unique_in_order<'s>(names: impl Iterator<Item = &'s str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}
