//! Event log command line interface
//!
//! # Commands
//!
//! - `evt merge` - Merge log files into one ordered stream
//! - `evt log` - Append an event to a log file
//! - `evt collect` - Run a configured collection over existing log files

mod collect;
mod log;
mod merge;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// evt - time-series event logs
///
/// Write events in CSV, LOG or InfluxDB line protocol and merge the logs of
/// many producers by timestamp.
#[derive(Parser)]
#[command(name = "evt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge log files into one stream ordered by timestamp
    ///
    /// Examples:
    ///   evt merge --format InfluxDB a.log b.log
    ///   evt merge --format InfluxDB --precision ms --keep-precision a.log b.log
    ///   evt merge --format LOG --no-sort --output json a.log b.log
    Merge(merge::MergeArgs),

    /// Append one event to a log file
    ///
    /// Examples:
    ///   evt log --file run.log --event start --collection upgrade --unit test
    ///   evt log --file run.csv --format CSV --event comment --comment "config set" --tag app=nova
    Log(log::LogArgs),

    /// Collect existing log files through a configured collection
    ///
    /// Examples:
    ///   evt collect --config events.json probe-1.log probe-2.log
    Collect(collect::CollectArgs),
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Merge(args) => merge::run(args),
        Commands::Log(args) => log::run(args),
        Commands::Collect(args) => collect::run(args),
    }
}
