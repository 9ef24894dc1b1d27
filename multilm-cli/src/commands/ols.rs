//! Fit an ordinary least squares model.
//!
//! multilm ols --data data.csv --formula "TLC_takeover ~ TLC_failure"

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;

use multilm_core::design::build_model_data;
use multilm_core::formula::Formula;
use multilm_core::ols::fit_ols;
use multilm_core::report;
use multilm_data::Frame;

use super::apply_renames;

#[derive(Args)]
pub struct OlsArgs {
    /// Data file (CSV or TSV with a header row)
    #[arg(long)]
    data: String,

    /// Model formula, e.g. "y ~ a + b*c"
    #[arg(long)]
    formula: String,

    /// Rename a column before fitting (repeatable)
    #[arg(long, value_name = "OLD=NEW")]
    rename: Vec<String>,
}

pub fn run(args: OlsArgs) -> Result<()> {
    let mut frame = Frame::read_delimited(Path::new(&args.data))?;
    info!(
        "Loaded {} rows x {} columns from {}",
        frame.n_rows(),
        frame.n_cols(),
        args.data
    );
    apply_renames(&mut frame, &args.rename)?;

    let formula = Formula::parse(&args.formula)?;
    let data = build_model_data(&frame, &formula, None)?;

    info!(
        "Fitting OLS: {} observations, {} terms",
        data.y.len(),
        data.x_names.len()
    );
    let fit = fit_ols(&data.y, &data.x, formula.intercept)?;

    println!(
        "{}",
        report::ols_summary(&fit, &data.x_names, &data.response)
    );
    Ok(())
}
