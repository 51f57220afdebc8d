//! Primary beam models.

use crate::constants::{AIRY_FWHM_FACTOR, FWHM_TO_SIGMA, SPEED_OF_LIGHT};
use crate::error::ModelError;

/// Direction-dependent power response of a single antenna.
pub trait PrimaryBeam: Send + Sync {
    /// Power response at zenith angle `za` (rad) and frequency `freq_hz`.
    ///
    /// Must return 0 below the horizon.
    fn power(&self, za: f64, freq_hz: f64) -> f64;
}

/// Azimuthally symmetric Gaussian beam sized to a dish diameter.
///
/// The width matches the FWHM of an Airy disc:
/// σ(λ) = arcsin(2.2150894 λ / (π D)) · 2 / 2.355.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBeam {
    diameter: f64,
}

impl GaussianBeam {
    /// Beam for a dish of diameter `diameter` metres.
    pub fn new(diameter: f64) -> Result<Self, ModelError> {
        ModelError::require_positive("dish_diameter", diameter)?;
        Ok(Self { diameter })
    }

    /// Dish diameter (m).
    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    /// Gaussian standard deviation (rad) at `freq_hz`.
    pub fn sigma(&self, freq_hz: f64) -> f64 {
        let wavelength = SPEED_OF_LIGHT / freq_hz;
        let arg = (AIRY_FWHM_FACTOR * wavelength / (core::f64::consts::PI * self.diameter)).min(1.0);
        arg.asin() * 2.0 / FWHM_TO_SIGMA
    }
}

impl PrimaryBeam for GaussianBeam {
    fn power(&self, za: f64, freq_hz: f64) -> f64 {
        if !(0.0..=core::f64::consts::FRAC_PI_2).contains(&za) {
            return 0.0;
        }
        let sigma = self.sigma(freq_hz);
        (-0.5 * za * za / (sigma * sigma)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_at_zenith() {
        let beam = GaussianBeam::new(14.0).unwrap();
        assert_eq!(beam.power(0.0, 100e6), 1.0);
    }

    #[test]
    fn test_zero_below_horizon() {
        let beam = GaussianBeam::new(14.0).unwrap();
        assert_eq!(beam.power(1.6, 100e6), 0.0);
    }

    #[test]
    fn test_narrower_at_higher_frequency() {
        let beam = GaussianBeam::new(14.0).unwrap();
        assert!(beam.sigma(200e6) < beam.sigma(100e6));
        assert!(beam.power(0.2, 200e6) < beam.power(0.2, 100e6));
    }

    #[test]
    fn test_half_power_at_half_fwhm() {
        let beam = GaussianBeam::new(14.0).unwrap();
        let sigma = beam.sigma(150e6);
        let half_fwhm = 0.5 * FWHM_TO_SIGMA * sigma;
        assert!((beam.power(half_fwhm, 150e6) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_zero_diameter() {
        assert!(GaussianBeam::new(0.0).is_err());
    }
}
