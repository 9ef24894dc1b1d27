//! Design-matrix construction from a frame and a formula.
//!
//! Resolves formula terms against typed columns: numeric variables map
//! to themselves, categorical variables expand to treatment-coded
//! indicators (first level as reference), and interaction terms take
//! the cartesian product of their factors' encoded columns. Rows with
//! a missing value in any referenced column are dropped before
//! encoding.

use anyhow::{bail, Context, Result};
use tracing::info;

use multilm_data::{Column, Frame};
use multilm_linalg::DenseMatrix;

use crate::formula::{Formula, RandomFormula, Term};

/// Group assignment for mixed models.
#[derive(Debug, Clone)]
pub struct GroupIndex {
    /// Distinct group labels, in order of first appearance.
    pub labels: Vec<String>,
    /// Per-row group id, indexing into `labels`.
    pub assignment: Vec<usize>,
}

impl GroupIndex {
    pub fn n_groups(&self) -> usize {
        self.labels.len()
    }

    /// Row indices belonging to each group.
    pub fn rows_by_group(&self) -> Vec<Vec<usize>> {
        let mut rows = vec![Vec::new(); self.labels.len()];
        for (i, &g) in self.assignment.iter().enumerate() {
            rows[g].push(i);
        }
        rows
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.labels.len()];
        for &g in &self.assignment {
            sizes[g] += 1;
        }
        sizes
    }
}

/// The random-effects side of a mixed model.
#[derive(Debug, Clone)]
pub struct RandomPart {
    pub z: DenseMatrix,
    pub z_names: Vec<String>,
    pub groups: GroupIndex,
    pub group_name: String,
}

/// Response and design matrices for one model, after complete-case
/// filtering over every referenced column.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub response: String,
    pub y: Vec<f64>,
    pub x: DenseMatrix,
    pub x_names: Vec<String>,
    pub random: Option<RandomPart>,
    /// Rows dropped for missing values.
    pub n_dropped: usize,
}

/// Build model matrices from a frame. `random` carries the
/// random-effects formula and the grouping column for mixed models.
pub fn build_model_data(
    frame: &Frame,
    formula: &Formula,
    random: Option<(&RandomFormula, &str)>,
) -> Result<ModelData> {
    // Every column the model touches shares one complete-case mask.
    let mut referenced: Vec<&str> = formula.columns();
    if let Some((re, group_col)) = random {
        for c in re.columns() {
            if !referenced.contains(&c) {
                referenced.push(c);
            }
        }
        if !referenced.contains(&group_col) {
            referenced.push(group_col);
        }
    }

    let rows = frame.complete_cases(&referenced)?;
    let n_dropped = frame.n_rows() - rows.len();
    if rows.is_empty() {
        bail!("No complete rows left after removing missing values");
    }
    if n_dropped > 0 {
        info!(
            "Dropped {} of {} rows with missing values",
            n_dropped,
            frame.n_rows()
        );
    }

    let y: Vec<f64> = {
        let col = frame
            .numeric(&formula.response)
            .with_context(|| format!("Response '{}' must be numeric", formula.response))?;
        rows.iter().map(|&i| col[i]).collect()
    };

    let (x, x_names) =
        encode_terms(frame, &rows, &formula.terms, formula.intercept)?;

    let random = match random {
        None => None,
        Some((re, group_col)) => {
            let (z, z_names) = encode_terms(frame, &rows, &re.terms, re.intercept)?;
            let groups = group_index(frame, &rows, group_col)?;
            Some(RandomPart {
                z,
                z_names,
                groups,
                group_name: group_col.to_string(),
            })
        }
    };

    Ok(ModelData {
        response: formula.response.clone(),
        y,
        x,
        x_names,
        random,
        n_dropped,
    })
}

/// Encode terms into named design columns over the kept rows.
fn encode_terms(
    frame: &Frame,
    rows: &[usize],
    terms: &[Term],
    intercept: bool,
) -> Result<(DenseMatrix, Vec<String>)> {
    let mut names = Vec::new();
    let mut cols: Vec<Vec<f64>> = Vec::new();

    if intercept {
        names.push("Intercept".to_string());
        cols.push(vec![1.0; rows.len()]);
    }

    for term in terms {
        let mut encoded: Vec<(String, Vec<f64>)> = vec![(String::new(), Vec::new())];
        for factor in &term.factors {
            let factor_cols = encode_factor(frame, rows, factor)?;
            let mut next = Vec::with_capacity(encoded.len() * factor_cols.len());
            for (prefix, values) in &encoded {
                for (fname, fvalues) in &factor_cols {
                    let name = if prefix.is_empty() {
                        fname.clone()
                    } else {
                        format!("{}:{}", prefix, fname)
                    };
                    let product = if values.is_empty() {
                        fvalues.clone()
                    } else {
                        values
                            .iter()
                            .zip(fvalues.iter())
                            .map(|(a, b)| a * b)
                            .collect()
                    };
                    next.push((name, product));
                }
            }
            encoded = next;
        }
        for (name, values) in encoded {
            if values.is_empty() {
                continue;
            }
            names.push(name);
            cols.push(values);
        }
    }

    if cols.is_empty() {
        bail!("Formula produces an empty design matrix");
    }

    Ok((DenseMatrix::from_columns(&cols), names))
}

/// Encode one variable over the kept rows: a numeric column passes
/// through; a categorical column becomes indicators for every
/// non-reference level.
fn encode_factor(
    frame: &Frame,
    rows: &[usize],
    name: &str,
) -> Result<Vec<(String, Vec<f64>)>> {
    match frame.column(name)? {
        Column::Numeric(values) => {
            Ok(vec![(name.to_string(), rows.iter().map(|&i| values[i]).collect())])
        }
        Column::Categorical(values) => {
            let mut levels: Vec<&str> = rows
                .iter()
                .filter_map(|&i| values[i].as_deref())
                .collect();
            levels.sort_unstable();
            levels.dedup();
            if levels.len() < 2 {
                bail!(
                    "Categorical column '{}' has fewer than two levels in the data",
                    name
                );
            }
            // First (sorted) level is the reference.
            Ok(levels[1..]
                .iter()
                .map(|level| {
                    let indicator: Vec<f64> = rows
                        .iter()
                        .map(|&i| {
                            if values[i].as_deref() == Some(*level) {
                                1.0
                            } else {
                                0.0
                            }
                        })
                        .collect();
                    (format!("{}[{}]", name, level), indicator)
                })
                .collect())
        }
    }
}

/// Map a grouping column to contiguous group ids over the kept rows.
fn group_index(frame: &Frame, rows: &[usize], group_col: &str) -> Result<GroupIndex> {
    let col = frame.column(group_col)?;
    let mut labels: Vec<String> = Vec::new();
    let mut assignment = Vec::with_capacity(rows.len());
    for &i in rows {
        let label = col
            .label(i)
            .ok_or_else(|| anyhow::anyhow!("Missing group label in column '{}'", group_col))?;
        let id = match labels.iter().position(|l| *l == label) {
            Some(id) => id,
            None => {
                labels.push(label);
                labels.len() - 1
            }
        };
        assignment.push(id);
    }
    Ok(GroupIndex { labels, assignment })
}
