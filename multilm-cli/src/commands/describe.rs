//! Summarize the columns of a data file.
//!
//! multilm describe --data data.csv

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;

use multilm_data::{describe, Frame};

#[derive(Args)]
pub struct DescribeArgs {
    /// Data file (CSV or TSV with a header row)
    #[arg(long)]
    data: String,
}

pub fn run(args: DescribeArgs) -> Result<()> {
    let frame = Frame::read_delimited(Path::new(&args.data))?;
    info!(
        "Loaded {} rows x {} columns from {}",
        frame.n_rows(),
        frame.n_cols(),
        args.data
    );

    println!("{}: {} rows, {} columns", args.data, frame.n_rows(), frame.n_cols());
    println!(
        "{:<20} {:<12} {:>8} {:>12} {:>12} {:>12} {:>12}",
        "column", "type", "missing", "mean", "sd", "min", "max"
    );
    for s in describe(&frame) {
        match (&s.stats, s.n_levels) {
            (Some(st), _) => println!(
                "{:<20} {:<12} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                s.name, s.kind, s.n_missing, st.mean, st.sd, st.min, st.max
            ),
            (None, Some(levels)) => println!(
                "{:<20} {:<12} {:>8} {:>12}",
                s.name,
                s.kind,
                s.n_missing,
                format!("{} levels", levels)
            ),
            (None, None) => println!(
                "{:<20} {:<12} {:>8} {:>12}",
                s.name, s.kind, s.n_missing, "all missing"
            ),
        }
    }
    Ok(())
}
