//! Ordinary least squares with classical inference.
//!
//! Coefficients come from a thin QR of the design matrix, which also
//! surfaces rank deficiency. Standard errors, t statistics, p-values
//! and confidence intervals use the Student t distribution with n - p
//! residual degrees of freedom.

use anyhow::{bail, Context, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use multilm_linalg::decomposition::{inverse_spd, QrDecomp};
use multilm_linalg::DenseMatrix;

/// Result of an OLS fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    /// 95% confidence bounds.
    pub ci_lower: Vec<f64>,
    pub ci_upper: Vec<f64>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    /// Overall F test against the intercept-only model; None when the
    /// model has no intercept or no predictors.
    pub f_statistic: Option<f64>,
    pub f_pvalue: Option<f64>,
    /// Residual variance (RSS / df).
    pub sigma2: f64,
    pub df_resid: usize,
    pub n_obs: usize,
    pub log_likelihood: f64,
    pub residuals: Vec<f64>,
    /// Whether the design contains an intercept column.
    pub intercept: bool,
}

/// Fit y = X*beta by least squares.
///
/// Fails when n <= p or when X is rank-deficient.
pub fn fit_ols(y: &[f64], x: &DenseMatrix, intercept: bool) -> Result<OlsFit> {
    let n = y.len();
    let p = x.ncols();
    if x.nrows() != n {
        bail!(
            "Design matrix has {} rows but the response has {}",
            x.nrows(),
            n
        );
    }
    if n <= p {
        bail!(
            "Too few observations: {} rows for {} model terms",
            n,
            p
        );
    }

    let qr = QrDecomp::new(x).context("Failed to factor the design matrix")?;
    let coefficients = qr.solve(y);

    let fitted = x.mat_vec(&coefficients);
    let residuals: Vec<f64> = y.iter().zip(fitted.iter()).map(|(a, b)| a - b).collect();
    let rss: f64 = residuals.iter().map(|r| r * r).sum();

    let df_resid = n - p;
    let sigma2 = rss / df_resid as f64;

    let xtx_inv = inverse_spd(&x.xtx()).context("Design cross-product is not invertible")?;
    let std_errors: Vec<f64> = xtx_inv
        .diag()
        .iter()
        .map(|&v| (sigma2 * v).sqrt())
        .collect();

    let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)?;
    let t_values: Vec<f64> = coefficients
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| if se > 0.0 { b / se } else { f64::INFINITY })
        .collect();
    let p_values: Vec<f64> = t_values
        .iter()
        .map(|&t| (2.0 * (1.0 - t_dist.cdf(t.abs()))).clamp(0.0, 1.0))
        .collect();

    let t_crit = t_dist.inverse_cdf(0.975);
    let ci_lower: Vec<f64> = coefficients
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| b - t_crit * se)
        .collect();
    let ci_upper: Vec<f64> = coefficients
        .iter()
        .zip(std_errors.iter())
        .map(|(&b, &se)| b + t_crit * se)
        .collect();

    // Total sum of squares: centered when an intercept is present.
    let tss: f64 = if intercept {
        let mean = y.iter().sum::<f64>() / n as f64;
        y.iter().map(|v| (v - mean).powi(2)).sum()
    } else {
        y.iter().map(|v| v * v).sum()
    };
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };
    let adj_r_squared = if tss > 0.0 {
        let adj_n = if intercept { n as f64 - 1.0 } else { n as f64 };
        1.0 - (1.0 - r_squared) * adj_n / df_resid as f64
    } else {
        f64::NAN
    };

    let (f_statistic, f_pvalue) = if intercept && p > 1 && rss > 0.0 {
        let df_model = (p - 1) as f64;
        let f = ((tss - rss) / df_model) / (rss / df_resid as f64);
        let f_dist = FisherSnedecor::new(df_model, df_resid as f64)?;
        (Some(f), Some(1.0 - f_dist.cdf(f)))
    } else {
        (None, None)
    };

    // Gaussian log-likelihood at the ML variance estimate RSS/n.
    let n_f = n as f64;
    let log_likelihood = if rss > 0.0 {
        -0.5 * n_f * ((2.0 * std::f64::consts::PI * rss / n_f).ln() + 1.0)
    } else {
        f64::INFINITY
    };

    Ok(OlsFit {
        coefficients,
        std_errors,
        t_values,
        p_values,
        ci_lower,
        ci_upper,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_pvalue,
        sigma2,
        df_resid,
        n_obs: n,
        log_likelihood,
        residuals,
        intercept,
    })
}
