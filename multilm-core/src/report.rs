//! Plain-text model summaries.
//!
//! Formats fit results as the coefficient tables familiar from
//! classical statistics packages: a header block, a fixed-effects
//! table with standard errors and p-values, and (for mixed models)
//! the random-effects variances and covariances.

use std::fmt::Write;

use crate::lmm::LmmFit;
use crate::ols::OlsFit;

const RULE: &str =
    "======================================================================";
const THIN_RULE: &str =
    "----------------------------------------------------------------------";

/// Summary of an OLS fit.
pub fn ols_summary(fit: &OlsFit, names: &[String], response: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, " Ordinary least squares");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        " Dependent variable: {:<18} Observations:   {}",
        response, fit.n_obs
    );
    let _ = writeln!(
        out,
        " R-squared:          {:<18} Adj. R-squared: {}",
        format_stat(fit.r_squared),
        format_stat(fit.adj_r_squared)
    );
    let f_text = match (fit.f_statistic, fit.f_pvalue) {
        (Some(f), Some(p)) => format!("{:.4} (p={:.4})", f, p),
        _ => "--".to_string(),
    };
    let _ = writeln!(
        out,
        " F-statistic:        {:<18} Residual df:    {}",
        f_text, fit.df_resid
    );
    let _ = writeln!(
        out,
        " Log-likelihood:     {:<18} Residual var:   {}",
        format_stat(fit.log_likelihood),
        format_stat(fit.sigma2)
    );
    let _ = writeln!(out, "{}", THIN_RULE);
    coefficient_table(
        &mut out,
        names,
        &fit.coefficients,
        &fit.std_errors,
        &fit.t_values,
        &fit.p_values,
        &fit.ci_lower,
        &fit.ci_upper,
        "t",
    );
    let _ = write!(out, "{}", RULE);
    out
}

/// Summary of a mixed-model fit.
pub fn lmm_summary(
    fit: &LmmFit,
    fe_names: &[String],
    re_names: &[String],
    response: &str,
    group: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        " Mixed linear model ({})",
        if fit.reml { "REML" } else { "ML" }
    );
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        " Dependent variable: {:<18} Groups ({}):    {}",
        response, group, fit.n_groups
    );
    let _ = writeln!(
        out,
        " Observations:       {:<18} Group sizes:    {}-{}",
        fit.n_obs, fit.group_sizes.0, fit.group_sizes.1
    );
    let _ = writeln!(
        out,
        " Log-likelihood:     {:<18} Converged:      {}",
        format_stat(fit.log_likelihood),
        if fit.converged {
            format!("yes ({} iterations)", fit.iterations)
        } else {
            format!("NO ({} iterations)", fit.iterations)
        }
    );
    let _ = writeln!(out, " Residual variance:  {}", format_stat(fit.sigma2));
    let _ = writeln!(out, "{}", THIN_RULE);
    let _ = writeln!(out, " Fixed effects");
    coefficient_table(
        &mut out,
        fe_names,
        &fit.beta,
        &fit.std_errors,
        &fit.z_values,
        &fit.p_values,
        &fit.ci_lower,
        &fit.ci_upper,
        "z",
    );
    let _ = writeln!(out, "{}", THIN_RULE);
    let _ = writeln!(out, " Random effects (by {})", group);
    let width = re_label_width(re_names);
    for (i, name) in re_names.iter().enumerate() {
        let _ = writeln!(
            out,
            " {:<width$} Var {:>12.6}",
            name,
            fit.psi.get(i, i),
            width = width
        );
    }
    for i in 0..re_names.len() {
        for j in (i + 1)..re_names.len() {
            let _ = writeln!(
                out,
                " {:<width$} Cov {:>12.6}",
                format!("{} x {}", re_names[i], re_names[j]),
                fit.psi.get(i, j),
                width = width
            );
        }
    }
    let _ = write!(out, "{}", RULE);
    out
}

#[allow(clippy::too_many_arguments)]
fn coefficient_table(
    out: &mut String,
    names: &[String],
    coefs: &[f64],
    std_errors: &[f64],
    stats: &[f64],
    p_values: &[f64],
    ci_lower: &[f64],
    ci_upper: &[f64],
    stat_label: &str,
) {
    let width = names
        .iter()
        .map(|n| n.len())
        .max()
        .unwrap_or(8)
        .max(8);
    let _ = writeln!(
        out,
        " {:<width$} {:>10} {:>10} {:>9} {:>8} {:>10} {:>10}",
        "",
        "coef",
        "std err",
        stat_label,
        format!("P>|{}|", stat_label),
        "[0.025",
        "0.975]",
        width = width
    );
    for i in 0..names.len() {
        let _ = writeln!(
            out,
            " {:<width$} {:>10.4} {:>10.4} {:>9.3} {:>8.3} {:>10.4} {:>10.4}",
            names[i],
            coefs[i],
            std_errors[i],
            stats[i],
            p_values[i],
            ci_lower[i],
            ci_upper[i],
            width = width
        );
    }
}

fn re_label_width(re_names: &[String]) -> usize {
    let mut width = re_names.iter().map(|n| n.len()).max().unwrap_or(8);
    for i in 0..re_names.len() {
        for j in (i + 1)..re_names.len() {
            width = width.max(re_names[i].len() + re_names[j].len() + 3);
        }
    }
    width.max(8)
}

fn format_stat(v: f64) -> String {
    if v.is_nan() {
        "--".to_string()
    } else {
        format!("{:.4}", v)
    }
}
