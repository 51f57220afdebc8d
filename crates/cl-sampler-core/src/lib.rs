//! Numerical core for Gibbs sampling of sky harmonics and angular power spectra.
//!
//! This crate contains the pieces of the sampler that do not touch the file
//! system: spherical-harmonic transforms on a HEALPix ring grid, the drift-scan
//! observation model, the prior, the conjugate-gradient constrained-realization
//! solver, and the power-spectrum conditional draw. The `cl-sampler` crate
//! wraps these in a configured, persisted chain.
//!
//! # Features
//!
//! - `parallel` (default): run transforms and response products with rayon.
//!   Reductions stay sequential, so chains are bit-identical with or without
//!   this feature.
//!
//! # Usage
//!
//! ```ignore
//! use cl_sampler_core::{
//!     analysis::{GibbsKernel, PowerSpectrumSampler},
//!     model::{ObservationModel, ObservationSpec, PriorModel},
//!     seeds::SeedStream,
//! };
//! ```

#![warn(missing_docs)]

pub mod analysis;
pub mod constants;
pub mod error;
pub mod harmonics;
pub mod model;
mod parallel;
pub mod seeds;
pub mod statistics;
pub mod types;

pub use error::ModelError;
pub use harmonics::{AlmIndex, HealpixGeometry, HealpixTransform, SphericalTransform};
pub use seeds::{SeedStream, Stream};
pub use types::{Matrix, Vector};
