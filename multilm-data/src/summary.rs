//! Per-column summary statistics for the describe command.

use crate::frame::{Column, Frame};

/// Summary of one column.
#[derive(Debug, Clone)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: &'static str,
    pub n_missing: usize,
    /// Mean, standard deviation, min, max over non-missing values
    /// (numeric columns only).
    pub stats: Option<NumericStats>,
    /// Number of distinct levels (categorical columns only).
    pub n_levels: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct NumericStats {
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize every column of a frame.
pub fn describe(frame: &Frame) -> Vec<ColumnSummary> {
    frame
        .names()
        .iter()
        .map(|name| {
            let col = frame.column(name).expect("name from frame");
            match col {
                Column::Numeric(v) => ColumnSummary {
                    name: name.clone(),
                    kind: "numeric",
                    n_missing: col.n_missing(),
                    stats: numeric_stats(v),
                    n_levels: None,
                },
                Column::Categorical(v) => {
                    let mut levels: Vec<&str> =
                        v.iter().flatten().map(|s| s.as_str()).collect();
                    levels.sort_unstable();
                    levels.dedup();
                    ColumnSummary {
                        name: name.clone(),
                        kind: "categorical",
                        n_missing: col.n_missing(),
                        stats: None,
                        n_levels: Some(levels.len()),
                    }
                }
            }
        })
        .collect()
}

fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    let valid: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if valid.is_empty() {
        return None;
    }
    let n = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / n;
    let var = if valid.len() > 1 {
        valid.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(NumericStats {
        mean,
        sd: var.sqrt(),
        min,
        max,
    })
}
