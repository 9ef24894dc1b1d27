//! EM estimation for the linear mixed model.
//!
//! Model: y_i = X_i*beta + Z_i*b_i + e_i per group i, with
//! b_i ~ N(0, Psi) and e ~ N(0, sigma^2 * I). Each iteration:
//!   1. GLS update of beta at the current (Psi, sigma^2)
//!   2. E-step: BLUPs b_i and conditional second moments, using the
//!      REML projection (or V^{-1} under ML)
//!   3. M-step: closed-form Psi and sigma^2 updates, with structural
//!      constraints applied to Psi
//! Convergence is declared on the relative change of the variance
//! parameters. The marginal covariance V_i = Z_i*Psi*Z_i' + sigma^2*I
//! is factored per group by Cholesky; groups are processed in
//! parallel.
//!
//! The E/M formulas follow the multilevel estimation conventions of
//! Lindstrom & Bates (1988), so estimates line up with reference
//! implementations.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, info, warn};

use multilm_linalg::decomposition::CholeskyDecomp;
use multilm_linalg::DenseMatrix;

use crate::design::GroupIndex;

use super::covariance::CovStructure;

/// Configuration for the EM iterations.
#[derive(Debug, Clone)]
pub struct LmmConfig {
    /// Restricted maximum likelihood (true) or full ML (false).
    pub reml: bool,
    /// Maximum EM iterations.
    pub max_iter: usize,
    /// Convergence tolerance on relative parameter change.
    pub tol: f64,
    /// Structural constraint on the random-effects covariance.
    pub structure: CovStructure,
}

impl Default for LmmConfig {
    fn default() -> Self {
        Self {
            reml: true,
            max_iter: 200,
            tol: 1e-6,
            structure: CovStructure::Unstructured,
        }
    }
}

/// Result of a mixed-model fit.
#[derive(Debug, Clone)]
pub struct LmmFit {
    /// Fixed-effects coefficients.
    pub beta: Vec<f64>,
    /// Standard errors from (X'V^{-1}X)^{-1}.
    pub std_errors: Vec<f64>,
    pub z_values: Vec<f64>,
    pub p_values: Vec<f64>,
    /// 95% confidence bounds.
    pub ci_lower: Vec<f64>,
    pub ci_upper: Vec<f64>,
    /// Random-effects covariance (q x q).
    pub psi: DenseMatrix,
    /// Residual variance.
    pub sigma2: f64,
    /// REML or ML criterion at the final parameters.
    pub log_likelihood: f64,
    pub reml: bool,
    pub converged: bool,
    pub iterations: usize,
    pub n_obs: usize,
    pub n_groups: usize,
    /// Smallest and largest group size.
    pub group_sizes: (usize, usize),
    /// Predicted random effects (BLUPs), one vector of length q per
    /// group, in group-label order.
    pub random_effects: Vec<Vec<f64>>,
    /// Marginal residuals y - X*beta.
    pub residuals: Vec<f64>,
}

/// Per-group data blocks.
struct GroupBlock {
    x: DenseMatrix,
    z: DenseMatrix,
    y: Vec<f64>,
}

/// Per-group quantities at the current variance parameters.
struct GroupState {
    /// X_i' V_i^{-1} X_i.
    a: DenseMatrix,
    /// X_i' V_i^{-1} y_i.
    c: Vec<f64>,
    ln_det_v: f64,
    vinv: DenseMatrix,
    /// V_i^{-1} X_i.
    w: DenseMatrix,
}

/// Per-group E-step output.
struct EStep {
    /// b_i b_i' + Psi - Psi Z_i' P_i Z_i Psi.
    s_psi: DenseMatrix,
    /// Squared norm of the conditional residual.
    ee: f64,
    /// trace(P_i).
    tr_p: f64,
}

/// Fit the linear mixed model by EM.
pub fn fit_lmm(
    y: &[f64],
    x: &DenseMatrix,
    z: &DenseMatrix,
    groups: &GroupIndex,
    config: &LmmConfig,
) -> Result<LmmFit> {
    let n = y.len();
    let p = x.ncols();
    let q = z.ncols();

    if x.nrows() != n || z.nrows() != n || groups.assignment.len() != n {
        bail!(
            "Inconsistent dimensions: y has {} rows, X {}, Z {}, groups {}",
            n,
            x.nrows(),
            z.nrows(),
            groups.assignment.len()
        );
    }
    if q == 0 {
        bail!("Mixed model needs at least one random effect column");
    }
    if n <= p {
        bail!("Too few observations: {} rows for {} fixed effects", n, p);
    }
    config.structure.validate(q)?;

    let sizes = groups.sizes();
    if let Some((g, &size)) = sizes
        .iter()
        .enumerate()
        .find(|(_, &s)| s < q)
    {
        bail!(
            "Group '{}' has {} observations but the model has {} random effects \
             per group; variance components are not identifiable",
            groups.labels[g],
            size,
            q
        );
    }

    let blocks: Vec<GroupBlock> = groups
        .rows_by_group()
        .iter()
        .map(|rows| GroupBlock {
            x: x.select_rows(rows),
            z: z.select_rows(rows),
            y: rows.iter().map(|&i| y[i]).collect(),
        })
        .collect();
    let k = blocks.len();

    // Starting values: OLS residual variance split evenly between the
    // residual and the random-effect variances.
    let ols_beta = multilm_linalg::decomposition::solve_spd(&x.xtx(), &x.xtv(y))
        .context("Fixed-effects design is collinear")?;
    let fitted = x.mat_vec(&ols_beta);
    let rss: f64 = y
        .iter()
        .zip(fitted.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    let var0 = (rss / (n - p) as f64).max(1e-8);

    let mut sigma2 = 0.5 * var0;
    let mut psi = DenseMatrix::identity(q).scale(0.5 * var0);
    config.structure.constrain(&mut psi);

    info!(
        "Starting EM ({}) with n={}, p={}, q={}, groups={}",
        if config.reml { "REML" } else { "ML" },
        n,
        p,
        q,
        k
    );

    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..config.max_iter {
        iterations = iter + 1;

        let states: Result<Vec<GroupState>> = blocks
            .par_iter()
            .map(|b| group_state(b, &psi, sigma2))
            .collect();
        let states = states?;

        let (beta, a_inv, _) = gls_beta(&states, p)?;

        let steps: Vec<EStep> = blocks
            .par_iter()
            .zip(states.par_iter())
            .map(|(b, st)| e_step(b, st, &psi, &beta, &a_inv, config.reml))
            .collect();

        let mut s_psi = DenseMatrix::zeros(q, q);
        let mut ee = 0.0;
        let mut tr_p = 0.0;
        for step in &steps {
            s_psi.add_in_place(&step.s_psi);
            ee += step.ee;
            tr_p += step.tr_p;
        }

        let mut psi_new = s_psi.scale(1.0 / k as f64);
        symmetrize(&mut psi_new);
        config.structure.constrain(&mut psi_new);
        floor_diagonal(&mut psi_new, 1e-12);

        let n_f = n as f64;
        let sigma2_new = ((ee + sigma2 * (n_f - sigma2 * tr_p)) / n_f).max(1e-12);

        let mut max_change = rel_change(sigma2_new, sigma2, config.tol);
        for i in 0..q {
            for j in 0..=i {
                max_change =
                    max_change.max(rel_change(psi_new.get(i, j), psi.get(i, j), config.tol));
            }
        }

        debug!(
            "EM iter {}: sigma2={:.6e}, psi[0,0]={:.6e}, change={:.2e}",
            iter,
            sigma2_new,
            psi_new.get(0, 0),
            max_change
        );

        psi = psi_new;
        sigma2 = sigma2_new;

        if max_change < config.tol {
            info!("EM converged after {} iterations", iter + 1);
            converged = true;
            break;
        }
    }

    if !converged {
        warn!("EM did not converge after {} iterations", config.max_iter);
    }

    // Final pass at the converged parameters.
    let states: Result<Vec<GroupState>> = blocks
        .par_iter()
        .map(|b| group_state(b, &psi, sigma2))
        .collect();
    let states = states?;

    let (beta, a_inv, chol_a) = gls_beta(&states, p)?;

    let mut ln_det_v = 0.0;
    let mut quad = 0.0;
    let mut random_effects = Vec::with_capacity(k);
    for (block, state) in blocks.iter().zip(states.iter()) {
        ln_det_v += state.ln_det_v;
        let xb = block.x.mat_vec(&beta);
        let r: Vec<f64> = block.y.iter().zip(xb.iter()).map(|(a, b)| a - b).collect();
        let u = state.vinv.mat_vec(&r);
        quad += DenseMatrix::dot(&r, &u);
        random_effects.push(psi.mat_vec(&block.z.xtv(&u)));
    }

    let ln_2pi = (2.0 * std::f64::consts::PI).ln();
    let log_likelihood = if config.reml {
        -0.5 * ((n - p) as f64 * ln_2pi + ln_det_v + chol_a.ln_det() + quad)
    } else {
        -0.5 * (n as f64 * ln_2pi + ln_det_v + quad)
    };

    let std_errors: Vec<f64> = a_inv.diag().iter().map(|&v| v.max(0.0).sqrt()).collect();
    let z_values: Vec<f64> = beta
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| if se > 0.0 { b / se } else { f64::INFINITY })
        .collect();
    let normal = Normal::new(0.0, 1.0)?;
    let p_values: Vec<f64> = z_values
        .iter()
        .map(|&zv| (2.0 * (1.0 - normal.cdf(zv.abs()))).clamp(0.0, 1.0))
        .collect();
    let z_crit = normal.inverse_cdf(0.975);
    let ci_lower: Vec<f64> = beta
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| b - z_crit * se)
        .collect();
    let ci_upper: Vec<f64> = beta
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| b + z_crit * se)
        .collect();

    let residuals: Vec<f64> = {
        let xb = x.mat_vec(&beta);
        y.iter().zip(xb.iter()).map(|(a, b)| a - b).collect()
    };

    let min_size = sizes.iter().copied().min().unwrap_or(0);
    let max_size = sizes.iter().copied().max().unwrap_or(0);

    Ok(LmmFit {
        beta,
        std_errors,
        z_values,
        p_values,
        ci_lower,
        ci_upper,
        psi,
        sigma2,
        log_likelihood,
        reml: config.reml,
        converged,
        iterations,
        n_obs: n,
        n_groups: k,
        group_sizes: (min_size, max_size),
        random_effects,
        residuals,
    })
}

/// Marginal covariance pieces for one group at (Psi, sigma^2).
fn group_state(block: &GroupBlock, psi: &DenseMatrix, sigma2: f64) -> Result<GroupState> {
    let zpsi = block.z.mat_mul(psi);
    let mut v = zpsi.mat_mul(&block.z.transpose());
    v.add_scaled_identity(sigma2);

    let chol = CholeskyDecomp::new(&v)
        .map_err(|e| anyhow::anyhow!("Marginal covariance factorization failed: {}", e))?;
    let ln_det_v = chol.ln_det();
    let vinv = chol.inverse();

    let w = vinv.mat_mul(&block.x);
    let a = block.x.transpose().mat_mul(&w);
    let c = w.transpose().mat_vec(&block.y);

    Ok(GroupState {
        a,
        c,
        ln_det_v,
        vinv,
        w,
    })
}

/// GLS solve for beta: (sum X_i'V^{-1}X_i)^{-1} * sum X_i'V^{-1}y_i.
fn gls_beta(
    states: &[GroupState],
    p: usize,
) -> Result<(Vec<f64>, DenseMatrix, CholeskyDecomp)> {
    let mut a_mat = DenseMatrix::zeros(p, p);
    let mut c = vec![0.0; p];
    for st in states {
        a_mat.add_in_place(&st.a);
        for j in 0..p {
            c[j] += st.c[j];
        }
    }
    let chol_a = CholeskyDecomp::new(&a_mat)
        .map_err(|_| anyhow::anyhow!("Fixed-effects cross-product is singular (collinear design?)"))?;
    let beta = chol_a.solve(&c);
    let a_inv = chol_a.inverse();
    Ok((beta, a_inv, chol_a))
}

/// E-step for one group: BLUP and conditional second moments under the
/// REML projection P_i = V^{-1} - V^{-1}X (X'V^{-1}X)^{-1} X'V^{-1}
/// (block restricted), or plain V^{-1} under ML.
fn e_step(
    block: &GroupBlock,
    state: &GroupState,
    psi: &DenseMatrix,
    beta: &[f64],
    a_inv: &DenseMatrix,
    reml: bool,
) -> EStep {
    let xb = block.x.mat_vec(beta);
    let r: Vec<f64> = block.y.iter().zip(xb.iter()).map(|(a, b)| a - b).collect();
    let u = state.vinv.mat_vec(&r);

    let b_hat = psi.mat_vec(&block.z.xtv(&u));

    let p_blk = if reml {
        state
            .vinv
            .sub(&state.w.mat_mul(a_inv).mat_mul(&state.w.transpose()))
    } else {
        state.vinv.clone()
    };

    // Z_i' P_i Z_i, then Psi - Psi (Z'PZ) Psi.
    let zpz = block.z.transpose().mat_mul(&p_blk).mat_mul(&block.z);
    let mut s_psi = psi.sub(&psi.mat_mul(&zpz).mat_mul(psi));
    let q = s_psi.nrows();
    for i in 0..q {
        for j in 0..q {
            s_psi.set(i, j, s_psi.get(i, j) + b_hat[i] * b_hat[j]);
        }
    }

    let zb = block.z.mat_vec(&b_hat);
    let ee = r
        .iter()
        .zip(zb.iter())
        .map(|(ri, zi)| (ri - zi) * (ri - zi))
        .sum();

    EStep {
        s_psi,
        ee,
        tr_p: p_blk.trace(),
    }
}

fn symmetrize(m: &mut DenseMatrix) {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m.get(i, j) + m.get(j, i));
            m.set(i, j, avg);
            m.set(j, i, avg);
        }
    }
}

fn floor_diagonal(m: &mut DenseMatrix, floor: f64) {
    for i in 0..m.nrows() {
        if m.get(i, i) < floor {
            m.set(i, i, floor);
        }
    }
}

fn rel_change(a: f64, b: f64, tol: f64) -> f64 {
    (a - b).abs() / (a.abs() + b.abs() + tol)
}
