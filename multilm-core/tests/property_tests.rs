//! Property-based tests using proptest.
//!
//! These verify invariants that must hold for all valid inputs rather
//! than specific numerical values:
//!   - p-values stay inside [0, 1]
//!   - variance estimates stay non-negative and finite
//!   - the estimated covariance matrix stays symmetric
//!   - the formula parser never panics and expands crossings correctly

use proptest::prelude::*;

use multilm_core::design::GroupIndex;
use multilm_core::formula::Formula;
use multilm_core::lmm::{fit_lmm, LmmConfig};
use multilm_core::ols::fit_ols;
use multilm_linalg::DenseMatrix;

fn gaussian<R: rand::Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(1e-12..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

// ---------------------------------------------------------------------------
// 1. OLS inference stays inside its bounds
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_ols_pvalues_in_unit_interval(
        n in 15usize..60,
        slope in -3.0f64..3.0,
        noise in 0.01f64..2.0,
        seed in 0u64..1000,
    ) {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

        let x_col: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let y: Vec<f64> = x_col
            .iter()
            .map(|x| 0.5 + slope * x + noise * gaussian(&mut rng))
            .collect();
        let x = DenseMatrix::from_columns(&[vec![1.0; n], x_col]);

        let fit = fit_ols(&y, &x, true).unwrap();

        for &p in &fit.p_values {
            prop_assert!((0.0..=1.0).contains(&p), "p-value out of range: {}", p);
        }
        prop_assert!(fit.r_squared <= 1.0 + 1e-12);
        prop_assert!(fit.sigma2 >= 0.0);
        for (&lo, &hi) in fit.ci_lower.iter().zip(fit.ci_upper.iter()) {
            prop_assert!(lo <= hi);
        }
        prop_assert!(fit.std_errors.iter().all(|se| se.is_finite() && *se >= 0.0));
    }
}

// ---------------------------------------------------------------------------
// 2. Mixed-model variance estimates stay valid
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_lmm_variances_valid(
        n_groups in 4usize..10,
        per_group in 4usize..10,
        intercept_sd in 0.1f64..1.0,
        seed in 0u64..500,
    ) {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

        let n = n_groups * per_group;
        let mut y = Vec::with_capacity(n);
        let mut x_col = Vec::with_capacity(n);
        let mut assignment = Vec::with_capacity(n);
        for g in 0..n_groups {
            let b0 = intercept_sd * gaussian(&mut rng);
            for t in 0..per_group {
                let xv = t as f64 / per_group as f64;
                y.push(1.0 + b0 + 2.0 * xv + 0.3 * gaussian(&mut rng));
                x_col.push(xv);
                assignment.push(g);
            }
        }
        let x = DenseMatrix::from_columns(&[vec![1.0; n], x_col]);
        let z = DenseMatrix::from_columns(&[vec![1.0; n]]);
        let groups = GroupIndex {
            labels: (0..n_groups).map(|g| format!("G{}", g)).collect(),
            assignment,
        };

        // Convergence is not required here, validity is.
        let config = LmmConfig {
            max_iter: 50,
            ..Default::default()
        };
        let fit = fit_lmm(&y, &x, &z, &groups, &config).unwrap();

        prop_assert!(fit.sigma2 > 0.0 && fit.sigma2.is_finite());
        prop_assert!(fit.psi.get(0, 0) >= 0.0 && fit.psi.get(0, 0).is_finite());
        prop_assert!(fit.log_likelihood.is_finite());
        for &p in &fit.p_values {
            prop_assert!((0.0..=1.0).contains(&p));
        }
        prop_assert_eq!(fit.random_effects.len(), n_groups);
    }

    #[test]
    fn prop_lmm_psi_symmetric(
        n_groups in 5usize..9,
        seed in 0u64..300,
    ) {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

        let per_group = 12;
        let n = n_groups * per_group;
        let mut y = Vec::with_capacity(n);
        let mut x_col = Vec::with_capacity(n);
        let mut assignment = Vec::with_capacity(n);
        for g in 0..n_groups {
            let b0 = 0.5 * gaussian(&mut rng);
            let b1 = 0.3 * gaussian(&mut rng);
            for t in 0..per_group {
                let xv = t as f64 / per_group as f64;
                y.push(1.0 + b0 + (2.0 + b1) * xv + 0.2 * gaussian(&mut rng));
                x_col.push(xv);
                assignment.push(g);
            }
        }
        let x = DenseMatrix::from_columns(&[vec![1.0; n], x_col.clone()]);
        let z = DenseMatrix::from_columns(&[vec![1.0; n], x_col]);
        let groups = GroupIndex {
            labels: (0..n_groups).map(|g| format!("G{}", g)).collect(),
            assignment,
        };

        let config = LmmConfig {
            max_iter: 50,
            ..Default::default()
        };
        let fit = fit_lmm(&y, &x, &z, &groups, &config).unwrap();

        prop_assert!((fit.psi.get(0, 1) - fit.psi.get(1, 0)).abs() < 1e-12);
        prop_assert!(fit.psi.get(0, 0) >= 0.0);
        prop_assert!(fit.psi.get(1, 1) >= 0.0);
        // Cauchy-Schwarz for a valid covariance.
        prop_assert!(
            fit.psi.get(0, 1).powi(2) <= fit.psi.get(0, 0) * fit.psi.get(1, 1) + 1e-9
        );
    }
}

// ---------------------------------------------------------------------------
// 3. Formula parsing is total and crossings expand completely
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_formula_parse_never_panics(input in "[a-z~+*: 01]{0,40}") {
        let _ = Formula::parse(&input);
    }

    #[test]
    fn prop_star_expansion_counts(m in 1usize..5) {
        let vars: Vec<String> = (0..m).map(|i| format!("v{}", i)).collect();
        let rhs = vars.join(" * ");
        let formula = Formula::parse(&format!("y ~ {}", rhs)).unwrap();
        // Full crossing of m variables: 2^m - 1 terms.
        prop_assert_eq!(formula.terms.len(), (1usize << m) - 1);
    }
}
