//! multilm-linalg: Linear algebra for the multilm model fitters
//!
//! Provides a dense matrix wrapper and the decompositions the
//! estimators rely on: Cholesky (solve, inverse, log-determinant)
//! for symmetric positive definite systems and thin QR for least
//! squares with rank-deficiency detection.

pub mod dense;
pub mod decomposition;

pub use dense::DenseMatrix;
