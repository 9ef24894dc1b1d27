//! Linear mixed-effects (multilevel) model fitting.
//!
//! Estimates y = X*beta + Z*b_group + noise with b_group ~ N(0, Psi)
//! by EM, under REML (default) or full ML:
//! - closed-form E/M steps over (Psi, sigma^2)
//! - generalized-least-squares update of beta each iteration
//! - optional structural constraints on Psi (e.g. diagonal-only)

pub mod covariance;
pub mod em;

pub use covariance::CovStructure;
pub use em::{fit_lmm, LmmConfig, LmmFit};
