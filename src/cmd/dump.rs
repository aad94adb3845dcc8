//! CLI handler for a dump run.

use crate::config::Config;
use crate::db::mysql::MySqlDatabase;
use crate::db::Database;
use crate::dumper::{DumpOptions, DumpStats, Dumper};
use crate::plan::{DumpPlan, DuplicateReport, Resolver};
use crate::progress::{table_callback, table_progress_bar};
use crate::schema::SchemaSnapshot;
use crate::writer::{ensure_output_dir, DumpWriter};
use anyhow::Context;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub struct DumpArgs {
    pub config: PathBuf,
    pub quiet: bool,
    pub progress: bool,
    pub json: bool,
    pub dry_run: bool,
}

/// JSON output for a finished dump
#[derive(Serialize)]
struct DumpJsonOutput<'a> {
    database: &'a str,
    output_file: String,
    elapsed_secs: f64,
    statistics: &'a DumpStats,
}

/// JSON output for a dry run
#[derive(Serialize)]
struct PlanJsonOutput {
    database: String,
    output_file: String,
    dry_run: bool,
    tables: Vec<PlanTableJson>,
}

#[derive(Serialize)]
struct PlanTableJson {
    name: String,
    policy: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rules: Vec<PlanRuleJson>,
}

#[derive(Serialize)]
struct PlanRuleJson {
    column: String,
    generator: String,
}

pub fn run(args: DumpArgs) -> anyhow::Result<()> {
    let chatty = !args.quiet && !args.json;

    let config = Config::load(&args.config)?;
    if chatty {
        println!("Using config file: {}", args.config.display());
        print_config_stats(&config);
    }

    let resolver = Resolver::new(&config.tables);
    let report = resolver.validate_table_sets();
    if chatty {
        print_duplicate_report(&report);
    }
    resolver.check_table_sets()?;
    resolver.check_obfuscate_section()?;

    ensure_output_dir(&config.output.directory)?;

    let mut db = MySqlDatabase::connect(&config.database)?;
    ping_or_close(&mut db)?;
    info!(
        server = db.server_version().as_deref().unwrap_or("unknown"),
        "connected"
    );

    let plan = match SchemaSnapshot::capture(&mut db).and_then(|s| resolver.build_plan(&s)) {
        Ok(plan) => plan,
        Err(e) => {
            if let Err(close_err) = db.close() {
                debug!(error = %close_err, "closing connection after failed planning");
            }
            return Err(e.into());
        }
    };

    let now = Local::now().fixed_offset();
    let path = config.dump_path(now);

    if args.dry_run {
        db.close()?;
        print_plan(&config, &plan, &path, args.json)?;
        return Ok(());
    }

    let writer = match DumpWriter::create(&path) {
        Ok(writer) => writer,
        Err(e) => {
            if let Err(close_err) = db.close() {
                debug!(error = %close_err, "closing connection after failed open");
            }
            return Err(e.into());
        }
    };
    info!(path = %path.display(), "writing dump");

    let options = DumpOptions {
        rows_per_insert: config.output.rows_per_insert,
        dumped_at: now,
        database_name: Some(config.database.database_name.clone()),
        host: Some(match config.database.net {
            crate::config::NetKind::Tcp => config.database.address(),
            crate::config::NetKind::Unix => config.database.socket.clone(),
        }),
        ..Default::default()
    };

    let start_time = Instant::now();
    let mut dumper = Dumper::new(db, writer, plan).with_options(options);

    let pb = if args.progress && !args.json {
        let pb = table_progress_bar(dumper.plan().len() as u64);
        dumper = dumper.with_progress(table_callback(pb.clone()));
        Some(pb)
    } else {
        None
    };

    let result = dumper.run();
    if let Some(pb) = pb {
        if result.is_ok() {
            pb.finish_with_message("done");
        } else {
            pb.abandon();
        }
    }
    let (stats, _) = result.with_context(|| format!("dump to {} failed", path.display()))?;
    let elapsed = start_time.elapsed();

    if args.json {
        let output = DumpJsonOutput {
            database: &config.database.database_name,
            output_file: path.display().to_string(),
            elapsed_secs: elapsed.as_secs_f64(),
            statistics: &stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !args.quiet {
        print_dump_stats(&stats, &path, elapsed.as_secs_f64());
    }

    Ok(())
}

/// Check connectivity; on failure the connection is closed before the
/// error is returned.
fn ping_or_close<D: Database>(db: &mut D) -> crate::error::Result<()> {
    if let Err(e) = db.ping() {
        if let Err(close_err) = db.close() {
            debug!(error = %close_err, "closing connection after failed ping");
        }
        return Err(e);
    }
    Ok(())
}

fn print_config_stats(config: &Config) {
    let tables = &config.tables;
    println!("Config parsed. Found tables count:");
    println!("  - to dump as is: {}", tables.keep.len());
    println!("  - to ignore: {}", tables.ignore.len());
    println!("  - to truncate: {}", tables.truncate.len());
    println!("  - to obfuscate: {}", tables.obfuscate.len());
    println!("Total: {}", tables.declared_count());
}

fn print_duplicate_report(report: &DuplicateReport) {
    println!("Checking for duplicated table names...done");
    for (section, names) in report.iter() {
        for name in names {
            println!("  - {} spotted multiple times in the {} section", name, section);
        }
    }
    if report.has_errors() {
        println!("Please fix the reported errors before proceeding");
    }
}

fn print_plan(config: &Config, plan: &DumpPlan, path: &Path, json: bool) -> anyhow::Result<()> {
    if json {
        let output = PlanJsonOutput {
            database: config.database.database_name.clone(),
            output_file: path.display().to_string(),
            dry_run: true,
            tables: plan
                .iter()
                .map(|t| PlanTableJson {
                    name: t.name.clone(),
                    policy: t.policy.to_string(),
                    rules: t
                        .rules
                        .iter()
                        .map(|r| PlanRuleJson {
                            column: r.column.clone(),
                            generator: r.generator.kind().to_string(),
                        })
                        .collect(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\n✓ Dry run completed!");
    println!("\nWould write {}:", path.display());
    for table in plan.iter() {
        println!("  - {} ({})", table.name, table.policy);
        for rule in &table.rules {
            println!("      {}: {}", rule.column, rule.generator.kind());
        }
    }
    Ok(())
}

fn print_dump_stats(stats: &DumpStats, path: &Path, elapsed_secs: f64) {
    println!("\n✓ Dump completed successfully!");
    println!("\nStatistics:");
    println!("  Tables kept: {}", stats.tables_kept);
    println!("  Tables obfuscated: {}", stats.tables_obfuscated);
    println!("  Tables truncated: {}", stats.tables_truncated);
    println!("  Tables ignored: {}", stats.tables_ignored);
    println!("  Rows written: {}", stats.rows_written);
    println!("  Values obfuscated: {}", stats.values_obfuscated);
    println!(
        "  Bytes written: {:.2} MB",
        stats.bytes_written as f64 / (1024.0 * 1024.0)
    );
    println!("  Elapsed time: {:.3}s", elapsed_secs);
    println!("\nFile is saved to {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryDatabase, MemoryTable};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_failed_ping_closes_connection() {
        let mut db = MemoryDatabase::new()
            .with_table(MemoryTable::new("users", &["id"]))
            .unreachable();
        let closes = db.close_counter();

        let err = ping_or_close(&mut db).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(db.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_successful_ping_keeps_connection_open() {
        let mut db = MemoryDatabase::new().with_table(MemoryTable::new("users", &["id"]));
        ping_or_close(&mut db).unwrap();
        assert!(!db.is_closed());
        assert_eq!(db.list_tables().unwrap(), vec!["users"]);
    }
}
