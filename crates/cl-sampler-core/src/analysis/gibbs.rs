//! One Gibbs step: a_ℓm | C_ℓ, d followed by C_ℓ | a_ℓm.
//!
//! The kernel is stateless between calls. Every random draw for iteration
//! `i` comes from generators seeded by `(stream, i)`, so a step can be
//! replayed from its input state alone. That is what makes resumed chains
//! identical to uninterrupted ones.

use std::time::Instant;

use super::operator::LinearOperator;
use super::power_spectrum::PowerSpectrumSampler;
use super::solver::SolverDiagnostics;
use super::wiener::ConstrainedRealization;
use crate::seeds::{SeedStream, Stream};
use crate::types::Vector;

/// Input to a Gibbs step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    /// Current a_ℓm (realified).
    pub alm: Vector,
    /// Current C_ℓ.
    pub cl: Vector,
    /// Diagonal signal covariance implied by `cl`.
    pub signal_variance: Vector,
}

/// Output of a Gibbs step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSample {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Sampled a_ℓm.
    pub alm: Vector,
    /// Sampled C_ℓ.
    pub cl: Vector,
    /// σ_ℓ of `alm`.
    pub sigma: Vector,
    /// Multipoles whose C_ℓ draw was clamped.
    pub clamped: Vec<usize>,
    /// Linear-solve diagnostics.
    pub solver: SolverDiagnostics,
    /// Wall time of the whole step (s).
    pub seconds: f64,
}

/// Deterministic Gibbs transition.
pub struct GibbsKernel<'a, R: LinearOperator + ?Sized> {
    realization: ConstrainedRealization<'a, R>,
    spectrum: PowerSpectrumSampler,
    prior_variance: Vector,
    seeds: SeedStream,
}

impl<'a, R: LinearOperator + ?Sized> GibbsKernel<'a, R> {
    /// Assemble a kernel from its two conditional samplers.
    ///
    /// `prior_variance` is the diagonal prior covariance used for the first
    /// solve and for a fixed monopole.
    pub fn new(
        realization: ConstrainedRealization<'a, R>,
        spectrum: PowerSpectrumSampler,
        prior_variance: Vector,
        seeds: SeedStream,
    ) -> Self {
        Self {
            realization,
            spectrum,
            prior_variance,
            seeds,
        }
    }

    /// Constrained-realization sampler.
    pub fn realization(&self) -> &ConstrainedRealization<'a, R> {
        &self.realization
    }

    /// Power-spectrum sampler.
    pub fn spectrum(&self) -> &PowerSpectrumSampler {
        &self.spectrum
    }

    /// Starting state: prior spectrum and covariance.
    ///
    /// With `warm_start`, a_ℓm starts at the Wiener filter under the prior
    /// covariance and the solve diagnostics are returned. Otherwise a_ℓm
    /// starts at zero.
    pub fn initial_state(
        &self,
        prior_cl: &Vector,
        warm_start: bool,
    ) -> (ChainState, Option<SolverDiagnostics>) {
        let (alm, diagnostics) = if warm_start {
            let result = self.realization.wiener_filter(&self.prior_variance, None);
            tracing::debug!(
                iterations = result.diagnostics.iterations,
                residual = result.diagnostics.relative_residual,
                "Wiener-filter warm start"
            );
            (result.x, Some(result.diagnostics))
        } else {
            (Vector::zeros(self.prior_variance.len()), None)
        };
        let state = ChainState {
            alm,
            cl: prior_cl.clone(),
            signal_variance: self.prior_variance.clone(),
        };
        (state, diagnostics)
    }

    /// State for continuing from a previously drawn (a_ℓm, C_ℓ).
    pub fn state_from(&self, alm: Vector, cl: Vector) -> ChainState {
        let signal_variance = self.spectrum.signal_variance(&cl, &self.prior_variance);
        ChainState {
            alm,
            cl,
            signal_variance,
        }
    }

    /// State following `sample`.
    pub fn advance(&self, sample: &ChainSample) -> ChainState {
        self.state_from(sample.alm.clone(), sample.cl.clone())
    }

    /// Perform iteration `iteration` starting from `state`.
    pub fn step(&self, state: &ChainState, iteration: usize) -> ChainSample {
        let start = Instant::now();
        let index = iteration as u64;

        let mut rng = self.seeds.rng(Stream::AlmFluctuation, index);
        let solve = self
            .realization
            .draw(&state.signal_variance, Some(&state.alm), &mut rng);

        let mut rng = self.seeds.rng(Stream::SpectrumDraw, index);
        let draw = self.spectrum.draw(&solve.x, &mut rng);

        tracing::debug!(
            iteration,
            cg_iterations = solve.diagnostics.iterations,
            residual = solve.diagnostics.relative_residual,
            clamped = draw.clamped.len(),
            "Gibbs step"
        );

        ChainSample {
            iteration,
            alm: solve.x,
            cl: draw.cl,
            sigma: draw.sigma,
            clamped: draw.clamped,
            solver: solve.diagnostics,
            seconds: start.elapsed().as_secs_f64(),
        }
    }
}
