//! Spherical-harmonic representation of the sky.

mod healpix;
mod index;
mod transform;

pub use healpix::{HealpixGeometry, Ring};
pub use index::{AlmIndex, Mode, Part};
pub use transform::{
    normalized_legendre, HealpixTransform, SphericalTransform, DEFAULT_ANALYSIS_ITERATIONS,
};
