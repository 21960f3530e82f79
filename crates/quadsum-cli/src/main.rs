//! qsum - compare hierarchical point summaries.
//!
//! Builds the pyramid and the concurrent quadtree over random weighted points
//! and reports how long each took.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

mod commands;
mod config;
mod span;

use commands::{compare::CompareArgs, probe::ProbeArgs};
use config::Config;

/// qsum - Pyramid reduction vs. concurrent quadtree construction.
///
/// Run `qsum compare -d 8 -n 100000 -p -q` for a single measurement, or pass
/// a `START:END[:STEP]` range to `-d` or `-n` for a sweep.
#[derive(Parser, Debug)]
#[command(
    name = "qsum",
    author,
    version,
    about = "Compare pyramid reduction and concurrent quadtree construction",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// JSON configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Time both engines over random points.
    ///
    /// At most one of `--depth` and `--points` may be a range. With two
    /// scalars each engine gets its own section; with a range one tab-separated
    /// row is printed per configuration.
    Compare(CompareArgs),

    /// Measure worker pool dispatch latency and atomic add throughput.
    Probe(ProbeArgs),

    /// Print the effective configuration as JSON.
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    // Reports go to stdout; keep logs off it.
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Compare(args) => commands::compare::execute(config, &args, cli.verbose)?,
        Commands::Probe(args) => commands::probe::execute(config, &args)?,
        Commands::ShowConfig => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}
