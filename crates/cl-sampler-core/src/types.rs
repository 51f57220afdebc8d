//! Type aliases for the linear-algebra types used throughout the crate.

use nalgebra::{DMatrix, DVector};

/// Dynamically sized real vector (a_ℓm coefficients, maps, data).
pub type Vector = DVector<f64>;

/// Dynamically sized real matrix. Only used for small reference operators.
pub type Matrix = DMatrix<f64>;
