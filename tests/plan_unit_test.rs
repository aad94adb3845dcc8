//! Unit tests for table policy resolution and plan construction

use mysql_obfuscator::config::TablesConfig;
use mysql_obfuscator::db::ColumnInfo;
use mysql_obfuscator::error::DumpError;
use mysql_obfuscator::faker::{Generator, GeneratorKind};
use mysql_obfuscator::plan::{Resolver, Section, TablePolicy};
use mysql_obfuscator::schema::SchemaSnapshot;

fn tables(yaml: &str) -> TablesConfig {
    serde_yaml_ng::from_str(yaml).unwrap()
}

fn snapshot(tables: &[(&str, &[&str])]) -> SchemaSnapshot {
    let mut snapshot = SchemaSnapshot::new();
    for (name, columns) in tables {
        snapshot.add_table(
            name.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
    }
    snapshot
}

const CONFIG: &str = r#"
keep: [orders]
ignore: [sessions]
truncate: [audit_log]
obfuscate:
  users:
    email: { type: email }
    api_key: { type: string, length: 32 }
  profiles:
"#;

#[test]
fn test_duplicate_across_sections_listed_everywhere() {
    let config = tables(
        r#"
keep: [a, b]
ignore: [c, a]
truncate: [d]
obfuscate:
  b:
    x: { type: email }
"#,
    );
    let report = Resolver::new(&config).validate_table_sets();

    assert!(report.has_errors());
    assert_eq!(report.names(Section::Keep), &["a".to_string(), "b".to_string()]);
    assert_eq!(report.names(Section::Ignore), &["a".to_string()]);
    assert!(report.names(Section::Truncate).is_empty());
    assert_eq!(report.names(Section::Obfuscate), &["b".to_string()]);
    assert_eq!(
        report.names(Section::Overall),
        &["a".to_string(), "b".to_string()]
    );
}

#[test]
fn test_duplicate_validation_is_idempotent() {
    let config = tables("keep: [a, a]\ntruncate: [b]\nignore: [b]");
    let resolver = Resolver::new(&config);
    let first = resolver.validate_table_sets();
    let second = resolver.validate_table_sets();
    assert_eq!(first, second);

    let err = resolver.check_table_sets().unwrap_err();
    assert!(matches!(err, DumpError::DuplicateTables { .. }));
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn test_resolve_policy_per_section() {
    let config = tables(CONFIG);
    let resolver = Resolver::new(&config);
    assert_eq!(resolver.resolve_policy("orders").unwrap(), TablePolicy::Keep);
    assert_eq!(resolver.resolve_policy("sessions").unwrap(), TablePolicy::Ignore);
    assert_eq!(resolver.resolve_policy("audit_log").unwrap(), TablePolicy::Truncate);
    assert_eq!(resolver.resolve_policy("users").unwrap(), TablePolicy::Obfuscate);
    assert_eq!(resolver.resolve_policy("profiles").unwrap(), TablePolicy::Keep);
}

#[test]
fn test_ignore_wins_over_other_sections() {
    let config = tables("keep: [t]\ntruncate: [t]\nignore: [t]");
    assert_eq!(
        Resolver::new(&config).resolve_policy("t").unwrap(),
        TablePolicy::Ignore
    );
}

#[test]
fn test_unknown_generator_is_unresolved() {
    let config = tables(
        r#"
obfuscate:
  users:
    ssn: { type: social_security }
    email: { type: email }
    token: { type: string }
"#,
    );
    let resolver = Resolver::new(&config);
    let unresolved = resolver.validate_obfuscate_section();
    let columns: Vec<&str> = unresolved.iter().map(|r| r.column.as_str()).collect();
    assert_eq!(columns, vec!["ssn", "token"]);
    assert!(unresolved[0].reason.contains("social_security"));

    let err = resolver.check_obfuscate_section().unwrap_err();
    assert_eq!(err.exit_code(), 9);
}

#[test]
fn test_build_plan_in_schema_order() {
    let config = tables(CONFIG);
    let schema = snapshot(&[
        ("users", &["id", "email", "api_key", "name"]),
        ("orders", &["id"]),
        ("sessions", &["id"]),
        ("audit_log", &["id"]),
        ("profiles", &["id"]),
    ]);

    let plan = Resolver::new(&config).build_plan(&schema).unwrap();
    let names: Vec<&str> = plan.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["users", "orders", "sessions", "audit_log", "profiles"]);

    let users = plan.get("users").unwrap();
    assert_eq!(users.policy, TablePolicy::Obfuscate);
    assert_eq!(users.rules.len(), 2);
    assert_eq!(users.rules[0].generator.kind(), GeneratorKind::Email);
    assert_eq!(
        users.rules[1].generator,
        Generator::RandomString { length: 32 }
    );
    assert_eq!(plan.count(TablePolicy::Keep), 2);
    assert_eq!(plan.rule_count(), 2);
}

#[test]
fn test_build_plan_reports_mismatch_both_ways() {
    let config = tables(CONFIG);
    let schema = snapshot(&[
        ("users", &["id", "email", "api_key"]),
        ("orders", &["id"]),
        ("sessions", &["id"]),
        ("audit_log", &["id"]),
        ("payments", &["id"]),
    ]);

    match Resolver::new(&config).build_plan(&schema) {
        Err(DumpError::TableSetMismatch {
            missing_in_config,
            missing_in_schema,
        }) => {
            assert_eq!(missing_in_config, vec!["payments"]);
            assert_eq!(missing_in_schema, vec!["profiles"]);
        }
        other => panic!("expected table set mismatch, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn test_build_plan_rejects_unknown_column() {
    let config = tables("obfuscate:\n  users:\n    phone: { type: phone }\n");
    let schema = snapshot(&[("users", &["id", "email"])]);

    match Resolver::new(&config).build_plan(&schema) {
        Err(DumpError::UnresolvedRules { rules }) => {
            assert_eq!(rules.len(), 1);
            assert_eq!(rules[0].table, "users");
            assert_eq!(rules[0].column, "phone");
        }
        other => panic!("expected unresolved rules, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn test_build_plan_rejects_generated_column() {
    let config = tables("obfuscate:\n  people:\n    full_name: { type: name }\n    last: { type: last_name }\n");
    let mut schema = SchemaSnapshot::new();
    schema.add_table_columns(
        "people".to_string(),
        vec![
            ColumnInfo::new("id"),
            ColumnInfo::new("last"),
            ColumnInfo::generated("full_name"),
        ],
    );

    match Resolver::new(&config).build_plan(&schema) {
        Err(DumpError::UnresolvedRules { rules }) => {
            assert_eq!(rules.len(), 1);
            assert_eq!(rules[0].column, "full_name");
            assert_eq!(rules[0].reason, "generated column cannot be obfuscated");
        }
        other => panic!("expected unresolved rules, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn test_build_plan_selects_stored_columns_only() {
    let config = tables("keep: [people]");
    let mut schema = SchemaSnapshot::new();
    schema.add_table_columns(
        "people".to_string(),
        vec![ColumnInfo::new("id"), ColumnInfo::generated("label"), ColumnInfo::new("first")],
    );
    let plan = Resolver::new(&config).build_plan(&schema).unwrap();
    assert_eq!(plan.get("people").unwrap().columns, vec!["id", "first"]);
}

#[test]
fn test_build_plan_uses_database_column_case() {
    let config = tables("obfuscate:\n  users:\n    EMAIL: { type: email }\n");
    let schema = snapshot(&[("users", &["id", "Email"])]);
    let plan = Resolver::new(&config).build_plan(&schema).unwrap();
    assert_eq!(plan.get("users").unwrap().rules[0].column, "Email");
}

#[test]
fn test_build_plan_rejects_duplicates_first() {
    let config = tables("keep: [users, users]");
    let schema = snapshot(&[("users", &["id"])]);
    let err = Resolver::new(&config).build_plan(&schema).unwrap_err();
    assert!(matches!(err, DumpError::DuplicateTables { .. }));
}
