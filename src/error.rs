//! Run-level error taxonomy.

use std::io;
use std::path::PathBuf;

use cl_sampler_core::ModelError;

/// Errors that stop a chain.
///
/// Per-iteration problems (clamped C_ℓ draws, a single failed write,
/// non-convergence under the `continue` policy) are recorded on the sample
/// or in the write report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or contradictory configuration, caught before sampling.
    #[error("invalid configuration: {field}: {reason}")]
    Configuration {
        /// Offending option.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The sky, prior or instrument model could not be built.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The output directory does not exist.
    #[error("output directory {0} does not exist")]
    MissingOutputDirectory(PathBuf),

    /// The linear solve hit `maxiter` under the `abort` policy.
    #[error(
        "linear solve did not converge at iteration {iteration}: \
         relative residual {residual:.3e} after {iterations} iterations"
    )]
    SolverNonConvergence {
        /// Gibbs iteration.
        iteration: usize,
        /// CG iterations performed.
        iterations: usize,
        /// Final relative residual.
        residual: f64,
    },

    /// Filesystem failure outside the retried per-sample writes.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// JSON encoding failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// An existing chain file cannot be resumed.
    #[error("cannot resume from {path}: {reason}")]
    ChainFile {
        /// Chain file.
        path: PathBuf,
        /// Why it is unusable.
        reason: String,
    },

    /// The rayon pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

impl Error {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Configuration {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for run-level operations.
pub type Result<T> = std::result::Result<T, Error>;
