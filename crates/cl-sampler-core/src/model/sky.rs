//! Ground-truth sky realization.

use rand_distr::{Distribution, StandardNormal};

use super::spectrum::{component_variances, realized_spectrum, ReferenceSpectrum};
use crate::harmonics::AlmIndex;
use crate::seeds::{SeedStream, Stream};
use crate::types::Vector;

/// The simulated sky the data are generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    /// Realified a_ℓm at the reference frequency.
    pub alm: Vector,
    /// Realized spectrum σ_ℓ of `alm`; the "true C_ℓ" of the run.
    pub cl: Vector,
}

impl GroundTruth {
    /// Draw a sky from `spectrum` using the prior-seed truth stream.
    ///
    /// The monopole is deterministic, a_00 = √C_0, so the map mean equals the
    /// reference sky temperature. All other components are Gaussian with the
    /// per-component variances of `spectrum`.
    pub fn draw(index: AlmIndex, spectrum: &ReferenceSpectrum, seeds: &SeedStream) -> Self {
        let variances = component_variances(&spectrum.to_vector(index.lmax()), &index);
        let mut rng = seeds.rng(Stream::Truth, 0);

        let mut alm = Vector::zeros(index.len());
        alm[0] = spectrum.cl(0).sqrt();
        for i in 1..index.len() {
            let z: f64 = StandardNormal.sample(&mut rng);
            alm[i] = variances[i].sqrt() * z;
        }

        let cl = realized_spectrum(&alm, &index);
        tracing::debug!(
            lmax = index.lmax(),
            monopole = alm[0],
            "drew ground-truth sky"
        );
        Self { alm, cl }
    }
}
