//! Angular power spectra: the reference model and realized spectra.

use core::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MONOPOLE_TEMPERATURE_K, REFERENCE_AMPLITUDE, REFERENCE_PIVOT, REFERENCE_SLOPE,
};
use crate::harmonics::{AlmIndex, Part};
use crate::types::Vector;

/// Power-law reference spectrum for diffuse foreground emission.
///
/// ```text
/// C_0 = 4π T_mono²
/// C_ℓ = A (ℓ / ℓ_pivot)^α,   ℓ ≥ 1
/// ```
///
/// C_0 is chosen so that a_00 = √C_0 reproduces a map whose mean is T_mono.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpectrum {
    /// Mean sky temperature T_mono (K).
    pub monopole_temperature: f64,
    /// Amplitude A at the pivot multipole (K²).
    pub amplitude: f64,
    /// Pivot multipole ℓ_pivot.
    pub pivot: f64,
    /// Slope α.
    pub slope: f64,
}

impl Default for ReferenceSpectrum {
    fn default() -> Self {
        Self {
            monopole_temperature: MONOPOLE_TEMPERATURE_K,
            amplitude: REFERENCE_AMPLITUDE,
            pivot: REFERENCE_PIVOT,
            slope: REFERENCE_SLOPE,
        }
    }
}

impl ReferenceSpectrum {
    /// C_ℓ of the reference model.
    pub fn cl(&self, ell: usize) -> f64 {
        if ell == 0 {
            4.0 * PI * self.monopole_temperature * self.monopole_temperature
        } else {
            self.amplitude * (ell as f64 / self.pivot).powf(self.slope)
        }
    }

    /// C_0..=C_lmax of the reference model.
    pub fn to_vector(&self, lmax: usize) -> Vector {
        Vector::from_fn(lmax + 1, |ell, _| self.cl(ell))
    }
}

/// Per-ℓ sufficient statistic of a realified coefficient vector.
///
/// ```text
/// σ_ℓ = (a_ℓ0² + 2 Σ_{m≥1} (Re a_ℓm)² + (Im a_ℓm)²) / (2ℓ + 1)
/// ```
///
/// This is the realized power spectrum of `alm` (healpy's `alm2cl`).
pub fn realized_spectrum(alm: &Vector, index: &AlmIndex) -> Vector {
    debug_assert_eq!(alm.len(), index.len());
    let lmax = index.lmax();
    let mut sigma = Vector::zeros(lmax + 1);
    for ell in 0..=lmax {
        let mut power = alm[index.re(ell, 0)].powi(2);
        for m in 1..=ell {
            power += 2.0 * (alm[index.re(ell, m)].powi(2) + alm[index.im(ell, m)].powi(2));
        }
        sigma[ell] = power / (2 * ell + 1) as f64;
    }
    sigma
}

/// Per-component variances of an isotropic field with spectrum `cl`.
///
/// m = 0 components carry C_ℓ; the real and imaginary parts of m ≥ 1 modes
/// each carry C_ℓ / 2.
pub fn component_variances(cl: &Vector, index: &AlmIndex) -> Vector {
    debug_assert_eq!(cl.len(), index.n_ell());
    Vector::from_fn(index.len(), |i, _| {
        let mode = index.mode(i);
        match (mode.m, mode.part) {
            (0, Part::Re) => cl[mode.ell],
            _ => 0.5 * cl[mode.ell],
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_monopole_matches_temperature() {
        let spec = ReferenceSpectrum::default();
        let a00 = spec.cl(0).sqrt();
        // a_00 Y_00 = T_mono
        let t = a00 * 0.5 / PI.sqrt();
        assert!((t - MONOPOLE_TEMPERATURE_K).abs() < 1e-9);
    }

    #[test]
    fn test_reference_is_power_law() {
        let spec = ReferenceSpectrum::default();
        assert!((spec.cl(10) - REFERENCE_AMPLITUDE).abs() < 1e-9);
        assert!(spec.cl(2) > spec.cl(3));
        assert_eq!(spec.to_vector(5).len(), 6);
    }

    #[test]
    fn test_realized_spectrum_counts_both_signs_of_m() {
        let index = AlmIndex::new(2);
        let mut alm = Vector::zeros(index.len());
        alm[index.re(2, 0)] = 1.0;
        alm[index.re(2, 1)] = 1.0;
        alm[index.im(2, 2)] = 2.0;
        let sigma = realized_spectrum(&alm, &index);
        // (1 + 2·1 + 2·4) / 5
        assert!((sigma[2] - 11.0 / 5.0).abs() < 1e-14);
        assert_eq!(sigma[0], 0.0);
        assert_eq!(sigma[1], 0.0);
    }

    #[test]
    fn test_component_variances_split_m_modes() {
        let index = AlmIndex::new(3);
        let cl = Vector::from_vec(vec![4.0, 2.0, 6.0, 8.0]);
        let var = component_variances(&cl, &index);
        assert_eq!(var[index.re(0, 0)], 4.0);
        assert_eq!(var[index.re(2, 0)], 6.0);
        assert_eq!(var[index.re(2, 1)], 3.0);
        assert_eq!(var[index.im(3, 3)], 4.0);
    }
}
