//! Gaussian prior on the realified a_ℓm.
//!
//! The prior covariance is diagonal. Its spectrum is the realized C_ℓ of the
//! ground truth, optionally inflated by a cosmic-variance term, with the
//! monopole scaled by a front factor:
//!
//! ```text
//! S_i = C_ℓ(i)^true · (1 or ½) + f_cv √(2 / (2ℓ+1)) · C_ℓ(i)^true
//! S_0 ← front_factor · S_0
//! S_i ← max(S_i, 0.25)
//! ```
//!
//! The cosmic-variance term (only when enabled) is added in full to every
//! real component, including both parts of m ≥ 1 modes. The reported prior
//! spectrum is the m = 0 view of the same covariance:
//!
//! ```text
//! C_ℓ^prior = C_ℓ^true · (1 + f_cv √(2 / (2ℓ+1))),   C_0^prior ← front_factor · C_0^prior
//! ```

use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::sky::GroundTruth;
use super::spectrum::component_variances;
use crate::constants::{COSMIC_VARIANCE_FRACTION, MIN_PRIOR_VARIANCE};
use crate::error::ModelError;
use crate::harmonics::AlmIndex;
use crate::seeds::{SeedStream, Stream};
use crate::types::Vector;

/// Where the prior is centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorMean {
    /// Zero mean.
    #[default]
    Zero,
    /// Truth plus one draw from the prior covariance, monopole held at truth.
    PerturbedTruth,
}

/// Parameters of the prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorSettings {
    /// Inflate C_ℓ by the cosmic-variance term.
    pub cosmic_variance: bool,
    /// Multiplier on the ℓ = 0 prior variance.
    pub front_factor: f64,
    /// Prior mean policy.
    pub mean: PriorMean,
}

impl Default for PriorSettings {
    fn default() -> Self {
        Self {
            cosmic_variance: false,
            front_factor: 1.0,
            mean: PriorMean::Zero,
        }
    }
}

/// Mean and diagonal covariance of the a_ℓm prior.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorModel {
    index: AlmIndex,
    cl: Vector,
    mean: Vector,
    variance: Vector,
    floored: usize,
}

impl PriorModel {
    /// Build the prior from the ground truth.
    pub fn build(
        truth: &GroundTruth,
        index: AlmIndex,
        settings: &PriorSettings,
        seeds: &SeedStream,
    ) -> Result<Self, ModelError> {
        ModelError::require_positive("front_factor", settings.front_factor)?;
        if truth.alm.len() != index.len() {
            return Err(ModelError::DimensionMismatch {
                expected: index.len(),
                actual: truth.alm.len(),
            });
        }

        let mut cl = truth.cl.clone();
        let mut variance = component_variances(&truth.cl, &index);
        if settings.cosmic_variance {
            for (i, v) in variance.iter_mut().enumerate() {
                let ell = index.mode(i).ell;
                *v += cosmic_variance_fraction(ell) * truth.cl[ell];
            }
            for (ell, c) in cl.iter_mut().enumerate() {
                *c *= 1.0 + cosmic_variance_fraction(ell);
            }
        }
        cl[0] *= settings.front_factor;
        variance[0] *= settings.front_factor;

        let mut floored = 0;
        for v in variance.iter_mut() {
            if *v < MIN_PRIOR_VARIANCE {
                *v = MIN_PRIOR_VARIANCE;
                floored += 1;
            }
        }
        if floored > 0 {
            tracing::warn!(
                floored,
                floor = MIN_PRIOR_VARIANCE,
                "prior variance floored for low-power components"
            );
        }

        let mean = match settings.mean {
            PriorMean::Zero => Vector::zeros(index.len()),
            PriorMean::PerturbedTruth => {
                let mut rng = seeds.rng(Stream::PriorMean, 0);
                let mut mean = truth.alm.clone();
                for i in 1..index.len() {
                    let z: f64 = StandardNormal.sample(&mut rng);
                    mean[i] += variance[i].sqrt() * z;
                }
                mean
            }
        };

        Ok(Self {
            index,
            cl,
            mean,
            variance,
            floored,
        })
    }

    /// Index layout.
    pub fn index(&self) -> AlmIndex {
        self.index
    }

    /// Prior power spectrum C_ℓ^prior (after inflation and front factor).
    pub fn cl(&self) -> &Vector {
        &self.cl
    }

    /// Prior mean a₀.
    pub fn mean(&self) -> &Vector {
        &self.mean
    }

    /// Diagonal prior covariance S.
    pub fn variance(&self) -> &Vector {
        &self.variance
    }

    /// Number of components raised to the variance floor.
    pub fn floored_components(&self) -> usize {
        self.floored
    }
}

/// Fractional cosmic-variance inflation at multipole ℓ.
pub fn cosmic_variance_fraction(ell: usize) -> f64 {
    COSMIC_VARIANCE_FRACTION * (2.0 / (2 * ell + 1) as f64).sqrt()
}
