//! # cl-sampler
//!
//! Gibbs sampling of the sky's spherical-harmonic coefficients a_ℓm and
//! angular power spectrum C_ℓ from simulated drift-scan interferometer data.
//!
//! Each iteration alternates two conditional draws:
//! - a_ℓm | C_ℓ, d: a constrained realization, solved with conjugate
//!   gradients against the matrix-free drift-scan response
//! - C_ℓ | a_ℓm: an inverse-gamma draw per multipole
//!
//! The numerical engine lives in `cl-sampler-core`. This crate adds the run
//! configuration, the chain driver with its persistence and resume logic, and
//! output formatting. The `cl-gibbs` binary wraps it all in a CLI.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cl_sampler::{ChainRunner, Config};
//!
//! let config = Config::quick().directory("output").number_of_samples(20);
//! let summary = ChainRunner::new(config)?.run()?;
//! for row in &summary.spectrum {
//!     println!("ell {}: {:.3e} ± {:.3e}", row.ell, row.mean, row.std_dev);
//! }
//! ```
//!
//! ## Reproducibility
//!
//! Every random draw derives from `data_seed`, `prior_seed` and `jobid`.
//! Iteration `i` of a chain depends only on the state after iteration
//! `i − 1`, so a resumed chain is identical to an uninterrupted one.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod driver;
mod error;

pub mod output;

pub use config::{parse_bool, parse_frequencies, Config};
pub use driver::{ChainRunner, RunState, RunSummary, StopHandle};
pub use error::{Error, Result};

pub use cl_sampler_core;
pub use cl_sampler_core::model::PriorMean;
