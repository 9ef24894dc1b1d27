//! Structural constraints on the random-effects covariance matrix.

use anyhow::{bail, Result};

use multilm_linalg::DenseMatrix;

/// Which entries of the random-effects covariance Psi are free
/// parameters. Fixed entries are held at zero; variances (the
/// diagonal) are always free.
#[derive(Debug, Clone, PartialEq)]
pub enum CovStructure {
    /// All q*(q+1)/2 entries free.
    Unstructured,
    /// Variances only; all covariances fixed at zero. Suppresses the
    /// correlation between random intercept and random slopes.
    Diagonal,
    /// Explicit symmetric mask of free entries (true = free).
    Pattern(Vec<Vec<bool>>),
}

impl CovStructure {
    /// Check the structure against the number of random effects.
    pub fn validate(&self, q: usize) -> Result<()> {
        if let CovStructure::Pattern(mask) = self {
            if mask.len() != q || mask.iter().any(|row| row.len() != q) {
                bail!(
                    "Covariance pattern must be {q}x{q} for {q} random effects"
                );
            }
            for i in 0..q {
                if !mask[i][i] {
                    bail!("Covariance pattern fixes a variance at zero (entry {},{})", i, i);
                }
                for j in 0..q {
                    if mask[i][j] != mask[j][i] {
                        bail!("Covariance pattern is not symmetric (entries {},{} and {},{})", i, j, j, i);
                    }
                }
            }
        }
        Ok(())
    }

    /// Zero the fixed entries of a candidate Psi, in place.
    pub fn constrain(&self, psi: &mut DenseMatrix) {
        let q = psi.nrows();
        match self {
            CovStructure::Unstructured => {}
            CovStructure::Diagonal => {
                for i in 0..q {
                    for j in 0..q {
                        if i != j {
                            psi.set(i, j, 0.0);
                        }
                    }
                }
            }
            CovStructure::Pattern(mask) => {
                for i in 0..q {
                    for j in 0..q {
                        if !mask[i][j] {
                            psi.set(i, j, 0.0);
                        }
                    }
                }
            }
        }
    }
}
