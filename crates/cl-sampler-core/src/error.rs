//! Errors raised while building models from invalid parameters.

use thiserror::Error;

/// Errors raised when a model cannot be constructed from its parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The band-limit is not resolved by the pixelization.
    #[error("lmax {lmax} is not resolved by nside {nside} (requires lmax <= {max})")]
    UnresolvedBandLimit {
        /// Requested band-limit.
        lmax: usize,
        /// HEALPix resolution parameter.
        nside: usize,
        /// Largest band-limit supported by `nside`.
        max: usize,
    },

    /// The LST grid has no points.
    #[error("number of LST steps must be positive")]
    EmptyLstGrid,

    /// The LST window is empty or reversed.
    #[error("LST end ({end} h) must be later than LST start ({start} h)")]
    InvalidLstRange {
        /// Start of the window in hours.
        start: f64,
        /// End of the window in hours.
        end: f64,
    },

    /// A scalar parameter is outside its valid domain.
    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// A vector does not have the length an operator expects.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

impl ModelError {
    /// Reject `value` unless it is finite and strictly positive.
    pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Self::InvalidParameter {
                name,
                value,
                reason: "must be finite and positive",
            })
        }
    }
}
