//! multilm: regression and multilevel model fitting for tabular data.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "multilm",
    version,
    about = "multilm: OLS and linear mixed-effects models for delimited data",
    long_about = "Fits ordinary least squares and multilevel (mixed-effects) \
                  regression models to CSV/TSV data.\n\
                  Models are specified with formulas (response ~ predictors), \
                  with optional grouping and random-effects structure."
)]
struct Cli {
    /// Number of threads to use
    #[arg(long, default_value = "1", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the columns of a data file
    Describe(commands::describe::DescribeArgs),

    /// Fit an ordinary least squares model
    Ols(commands::ols::OlsArgs),

    /// Fit a linear mixed-effects (multilevel) model
    Mixed(commands::mixed::MixedArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Set up thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .ok();

    tracing::info!("multilm v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Describe(args) => commands::describe::run(args),
        Commands::Ols(args) => commands::ols::run(args),
        Commands::Mixed(args) => commands::mixed::run(args),
    }
}
