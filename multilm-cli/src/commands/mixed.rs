//! Fit a linear mixed-effects (multilevel) model.
//!
//! multilm mixed --data data.csv --formula "e_norm ~ n_back * lead" \
//!     --groups ppid --re-formula "~ n_back" [--no-re-correlation]

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use multilm_core::design::build_model_data;
use multilm_core::formula::{Formula, RandomFormula};
use multilm_core::lmm::{fit_lmm, CovStructure, LmmConfig};
use multilm_core::report;
use multilm_data::Frame;

use super::apply_renames;

#[derive(Args)]
pub struct MixedArgs {
    /// Data file (CSV or TSV with a header row)
    #[arg(long)]
    data: String,

    /// Fixed-effects formula, e.g. "e_norm ~ n_back * lead"
    #[arg(long)]
    formula: String,

    /// Grouping column (e.g. participant ID)
    #[arg(long)]
    groups: String,

    /// Random-effects formula, e.g. "~ n_back". Defaults to a random
    /// intercept per group.
    #[arg(long)]
    re_formula: Option<String>,

    /// Constrain the random-effects covariance to be diagonal
    /// (no intercept/slope correlation)
    #[arg(long, default_value = "false")]
    no_re_correlation: bool,

    /// Estimation method: reml or ml
    #[arg(long, default_value = "reml")]
    method: String,

    /// Maximum EM iterations
    #[arg(long, default_value = "200")]
    max_iter: usize,

    /// Convergence tolerance
    #[arg(long, default_value = "1e-6")]
    tol: f64,

    /// Rename a column before fitting (repeatable)
    #[arg(long, value_name = "OLD=NEW")]
    rename: Vec<String>,
}

pub fn run(args: MixedArgs) -> Result<()> {
    let reml = match args.method.to_lowercase().as_str() {
        "reml" => true,
        "ml" => false,
        _ => anyhow::bail!("Unknown estimation method: {}", args.method),
    };

    let mut frame = Frame::read_delimited(Path::new(&args.data))?;
    info!(
        "Loaded {} rows x {} columns from {}",
        frame.n_rows(),
        frame.n_cols(),
        args.data
    );
    apply_renames(&mut frame, &args.rename)?;

    let formula = Formula::parse(&args.formula)?;
    let re_formula = match &args.re_formula {
        Some(s) => RandomFormula::parse(s)?,
        None => RandomFormula::intercept_only(),
    };

    let data = build_model_data(&frame, &formula, Some((&re_formula, &args.groups)))?;
    let random = data.random.as_ref().expect("random part was requested");

    let structure = if args.no_re_correlation {
        CovStructure::Diagonal
    } else {
        CovStructure::Unstructured
    };
    let config = LmmConfig {
        reml,
        max_iter: args.max_iter,
        tol: args.tol,
        structure,
    };

    info!(
        "Fitting mixed model: {} observations, {} fixed effects, {} random effects, {} groups",
        data.y.len(),
        data.x_names.len(),
        random.z_names.len(),
        random.groups.n_groups()
    );
    let fit = fit_lmm(&data.y, &data.x, &random.z, &random.groups, &config)?;

    if !fit.converged {
        warn!(
            "Estimation did not converge after {} iterations; interpret with care",
            fit.iterations
        );
    }

    println!(
        "{}",
        report::lmm_summary(
            &fit,
            &data.x_names,
            &random.z_names,
            &data.response,
            &random.group_name
        )
    );
    Ok(())
}
