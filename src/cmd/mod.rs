mod dump;

use crate::error::DumpError;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mysql-obfuscator")]
#[command(version)]
#[command(
    about = "Dump a MySQL database with sensitive columns replaced by fake data",
    long_about = None
)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show a progress bar while dumping tables
    #[arg(short, long)]
    pub progress: bool,

    /// Print statistics (or the plan, with --dry-run) as JSON
    #[arg(long)]
    pub json: bool,

    /// Validate the config against the database and print the plan without
    /// writing a dump
    #[arg(long)]
    pub dry_run: bool,
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the level
/// chosen by `-v`/`-q`.
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    dump::run(dump::DumpArgs {
        config: cli.config,
        quiet: cli.quiet,
        progress: cli.progress,
        json: cli.json,
        dry_run: cli.dry_run,
    })
}

/// Process exit code for a failed run
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DumpError>())
        .map(DumpError::exit_code)
        .unwrap_or(1)
}
