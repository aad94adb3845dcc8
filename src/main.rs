// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod cmd;
mod config;
mod db;
mod dumper;
mod error;
mod faker;
mod plan;
mod progress;
mod schema;
mod writer;

use clap::Parser;
use cmd::Cli;

fn main() {
    let cli = Cli::parse();
    cmd::init_logging(cli.verbose, cli.quiet);

    if let Err(e) = cmd::run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(cmd::exit_code(&e));
    }
}
