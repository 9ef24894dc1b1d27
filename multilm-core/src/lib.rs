//! multilm-core: Regression model fitting for tabular experiment data
//!
//! Implements the analysis pipeline: formula parsing, design-matrix
//! construction from a data frame, ordinary least squares with full
//! inference, linear mixed-effects models estimated by EM (REML or ML)
//! with configurable random-effects covariance structure, and plain-text
//! summary reports.

pub mod design;
pub mod formula;
pub mod lmm;
pub mod ols;
pub mod report;
