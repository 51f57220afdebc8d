//! Conditional draw of C_ℓ given a_ℓm.
//!
//! For each multipole the conditional posterior is inverse-gamma in the
//! sufficient statistic σ_ℓ:
//!
//! ```text
//! C_ℓ = (2ℓ+1) σ_ℓ / χ²_ν
//! ```
//!
//! The degrees of freedom ν depend on the prior placed on C_ℓ:
//! - Jeffreys (uniform in ln C_ℓ): ν = 2ℓ + 1. Defined for every ℓ, the
//!   monopole included.
//! - Flat (uniform in C_ℓ): ν = 2ℓ − 1. Heavier-tailed, adding extra
//!   variance. Undefined at ℓ = 0, where the monopole is held fixed.
//!
//! Multipoles are drawn in ascending order from a single generator.

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::constants::CL_FLOOR;
use crate::harmonics::AlmIndex;
use crate::model::{component_variances, realized_spectrum};
use crate::types::Vector;

/// Prior on C_ℓ, which fixes the inverse-gamma degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumPosterior {
    /// ν = 2ℓ + 1.
    Jeffreys,
    /// ν = 2ℓ − 1.
    Flat,
}

impl SpectrumPosterior {
    /// Posterior family selected by the `cosmic_variance` switch.
    ///
    /// With cosmic variance the wider flat-prior form is used; without it the
    /// draw is tied to the sufficient statistic through the Jeffreys form.
    pub fn from_cosmic_variance(cosmic_variance: bool) -> Self {
        if cosmic_variance {
            SpectrumPosterior::Flat
        } else {
            SpectrumPosterior::Jeffreys
        }
    }

    /// Degrees of freedom ν at multipole ℓ.
    pub fn degrees_of_freedom(self, ell: usize) -> f64 {
        let two_ell = 2.0 * ell as f64;
        match self {
            SpectrumPosterior::Jeffreys => two_ell + 1.0,
            SpectrumPosterior::Flat => two_ell - 1.0,
        }
    }

    /// Whether the posterior is proper at multipole ℓ.
    pub fn is_defined_at(self, ell: usize) -> bool {
        self.degrees_of_freedom(ell) > 0.0
    }
}

/// Treatment of the monopole C_0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonopolePolicy {
    /// Draw C_0 like any other multipole, scaled by the front factor.
    #[default]
    Sample,
    /// Hold C_0 at its prior value.
    Fixed,
}

/// Result of one spectrum draw.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumDraw {
    /// Sampled C_ℓ, ℓ = 0..=lmax. Always ≥ CL_FLOOR.
    pub cl: Vector,
    /// Sufficient statistic σ_ℓ of the conditioning a_ℓm.
    pub sigma: Vector,
    /// Multipoles whose draw was clamped to CL_FLOOR.
    pub clamped: Vec<usize>,
}

/// Draws C_ℓ | a_ℓm.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrumSampler {
    index: AlmIndex,
    posterior: SpectrumPosterior,
    monopole: MonopolePolicy,
    front_factor: f64,
    fixed_monopole: f64,
}

impl PowerSpectrumSampler {
    /// Sampler for band-limit `index.lmax()`.
    ///
    /// `prior_monopole` is the C_0 used when the monopole is not sampled. A
    /// flat posterior always fixes the monopole, since it is improper at ℓ = 0.
    pub fn new(
        index: AlmIndex,
        posterior: SpectrumPosterior,
        monopole: MonopolePolicy,
        front_factor: f64,
        prior_monopole: f64,
    ) -> Self {
        let monopole = if posterior.is_defined_at(0) {
            monopole
        } else {
            MonopolePolicy::Fixed
        };
        Self {
            index,
            posterior,
            monopole,
            front_factor,
            fixed_monopole: prior_monopole,
        }
    }

    /// Posterior family.
    pub fn posterior(&self) -> SpectrumPosterior {
        self.posterior
    }

    /// Monopole policy actually in effect.
    pub fn monopole(&self) -> MonopolePolicy {
        self.monopole
    }

    /// Draw a new spectrum conditioned on `alm`.
    pub fn draw<G: Rng + ?Sized>(&self, alm: &Vector, rng: &mut G) -> SpectrumDraw {
        let sigma = realized_spectrum(alm, &self.index);
        let mut cl = Vector::zeros(self.index.n_ell());
        let mut clamped = Vec::new();

        for ell in 0..self.index.n_ell() {
            if ell == 0 && self.monopole == MonopolePolicy::Fixed {
                cl[0] = self.fixed_monopole;
                continue;
            }

            let nu = self.posterior.degrees_of_freedom(ell);
            let chi2 = match Gamma::new(0.5 * nu, 2.0) {
                Ok(dist) => dist.sample(rng),
                Err(_) => f64::NAN,
            };
            let mut value = (2 * ell + 1) as f64 * sigma[ell] / chi2;
            if ell == 0 {
                value *= self.front_factor;
            }

            if !value.is_finite() || value < CL_FLOOR {
                tracing::warn!(
                    ell,
                    sigma = sigma[ell],
                    draw = value,
                    floor = CL_FLOOR,
                    "degenerate C_ell draw clamped"
                );
                value = CL_FLOOR;
                clamped.push(ell);
            }
            cl[ell] = value;
        }

        SpectrumDraw { cl, sigma, clamped }
    }

    /// Diagonal signal covariance implied by `cl`.
    ///
    /// A fixed monopole keeps its prior variance.
    pub fn signal_variance(&self, cl: &Vector, prior_variance: &Vector) -> Vector {
        let mut variance = component_variances(cl, &self.index);
        if self.monopole == MonopolePolicy::Fixed {
            variance[0] = prior_variance[0];
        }
        variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn alm_with_power(index: AlmIndex) -> Vector {
        Vector::from_fn(index.len(), |i, _| 1.0 + 0.1 * i as f64)
    }

    #[test]
    fn test_degrees_of_freedom() {
        assert_eq!(SpectrumPosterior::Jeffreys.degrees_of_freedom(0), 1.0);
        assert_eq!(SpectrumPosterior::Jeffreys.degrees_of_freedom(3), 7.0);
        assert_eq!(SpectrumPosterior::Flat.degrees_of_freedom(3), 5.0);
        assert!(!SpectrumPosterior::Flat.is_defined_at(0));
        assert!(SpectrumPosterior::Flat.is_defined_at(1));
    }

    #[test]
    fn test_flat_posterior_fixes_monopole() {
        let index = AlmIndex::new(3);
        let sampler = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Flat,
            MonopolePolicy::Sample,
            1.0,
            42.0,
        );
        assert_eq!(sampler.monopole(), MonopolePolicy::Fixed);
        let draw = sampler.draw(&alm_with_power(index), &mut Xoshiro256PlusPlus::seed_from_u64(1));
        assert_eq!(draw.cl[0], 42.0);
    }

    #[test]
    fn test_monopole_drawn_like_any_other_ell() {
        // Jeffreys at ℓ = 0 is C_0 = σ_0 / χ²_1 with χ²_1 ~ Gamma(1/2, 2).
        let index = AlmIndex::new(2);
        let alm = alm_with_power(index);
        let sampler = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Jeffreys,
            MonopolePolicy::Sample,
            1.0,
            0.0,
        );
        let draw = sampler.draw(&alm, &mut Xoshiro256PlusPlus::seed_from_u64(9));

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let chi2: f64 = Gamma::new(0.5, 2.0).unwrap().sample(&mut rng);
        let expected = alm[0] * alm[0] / chi2;
        assert!((draw.cl[0] - expected).abs() < 1e-12 * expected);
    }

    #[test]
    fn test_front_factor_scales_monopole_draw() {
        let index = AlmIndex::new(4);
        let alm = alm_with_power(index);
        let base = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Jeffreys,
            MonopolePolicy::Sample,
            1.0,
            0.0,
        );
        let scaled = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Jeffreys,
            MonopolePolicy::Sample,
            4.0,
            0.0,
        );
        let a = base.draw(&alm, &mut Xoshiro256PlusPlus::seed_from_u64(5));
        let b = scaled.draw(&alm, &mut Xoshiro256PlusPlus::seed_from_u64(5));
        assert!((b.cl[0] / a.cl[0] - 4.0).abs() < 1e-12);
        assert_eq!(a.cl.rows(1, 4).into_owned(), b.cl.rows(1, 4).into_owned());
    }

    #[test]
    fn test_zero_power_is_clamped() {
        let index = AlmIndex::new(3);
        let sampler = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Jeffreys,
            MonopolePolicy::Sample,
            1.0,
            0.0,
        );
        let draw = sampler.draw(&Vector::zeros(index.len()), &mut Xoshiro256PlusPlus::seed_from_u64(2));
        assert_eq!(draw.clamped, vec![0, 1, 2, 3]);
        assert!(draw.cl.iter().all(|&c| c == CL_FLOOR));
    }

    #[test]
    fn test_posterior_mean_tracks_sigma() {
        // E[C_ℓ] = (2ℓ+1) σ / (ν − 2) for ν > 2.
        let index = AlmIndex::new(6);
        let alm = alm_with_power(index);
        let sampler = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Jeffreys,
            MonopolePolicy::Sample,
            1.0,
            0.0,
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(123);
        let n = 20_000;
        let mut mean = 0.0;
        for _ in 0..n {
            mean += sampler.draw(&alm, &mut rng).cl[6];
        }
        mean /= n as f64;
        let sigma = realized_spectrum(&alm, &index)[6];
        let expected = 13.0 * sigma / 11.0;
        assert!((mean / expected - 1.0).abs() < 0.03, "{mean} vs {expected}");
    }

    #[test]
    fn test_signal_variance_respects_fixed_monopole() {
        let index = AlmIndex::new(2);
        let sampler = PowerSpectrumSampler::new(
            index,
            SpectrumPosterior::Flat,
            MonopolePolicy::Sample,
            1.0,
            1.0,
        );
        let prior = Vector::from_element(index.len(), 7.0);
        let cl = Vector::from_vec(vec![100.0, 2.0, 4.0]);
        let s = sampler.signal_variance(&cl, &prior);
        assert_eq!(s[0], 7.0);
        assert_eq!(s[index.re(1, 0)], 2.0);
        assert_eq!(s[index.re(2, 1)], 2.0);
    }
}
