//! Sky, prior and instrument models, built once per chain.

mod array;
mod beam;
mod observation;
mod prior;
mod sky;
mod spectrum;

pub use array::{Antenna, AntennaArray, Baseline};
pub use beam::{GaussianBeam, PrimaryBeam};
pub use observation::{topocentric_direction, DriftScanResponse, ObservationModel, ObservationSpec};
pub use prior::{cosmic_variance_fraction, PriorMean, PriorModel, PriorSettings};
pub use sky::GroundTruth;
pub use spectrum::{component_variances, realized_spectrum, ReferenceSpectrum};
