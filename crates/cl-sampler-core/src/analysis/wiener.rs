//! Constrained-realization draws of a_ℓm given C_ℓ and the data.
//!
//! With diagonal noise N and signal S, a sample from the Gaussian conditional
//! P(a | C_ℓ, d) is the solution of
//!
//! ```text
//! (Rᵀ N⁻¹ R + S⁻¹) a = Rᵀ (N⁻¹ d + N^{−½} ω₁) + S⁻¹ a₀ + S^{−½} ω₀
//! ```
//!
//! with ω₀, ω₁ ~ N(0, I). Setting ω₀ = ω₁ = 0 gives the Wiener filter (the
//! posterior mean).

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::operator::{LinearOperator, PosteriorPrecision};
use super::solver::{ConjugateGradient, SolveResult};
use crate::error::ModelError;
use crate::types::Vector;

/// Solves the constrained-realization system for a fixed response and data set.
pub struct ConstrainedRealization<'a, R: LinearOperator + ?Sized> {
    response: &'a R,
    inv_noise: Vector,
    inv_noise_sqrt: Vector,
    /// Rᵀ N⁻¹ d, fixed for the chain.
    projected_data: Vector,
    prior_mean: Vector,
    solver: ConjugateGradient,
}

impl<'a, R: LinearOperator + ?Sized> ConstrainedRealization<'a, R> {
    /// Precompute the data term Rᵀ N⁻¹ d.
    pub fn new(
        response: &'a R,
        data: &Vector,
        noise_variance: &Vector,
        prior_mean: Vector,
        solver: ConjugateGradient,
    ) -> Result<Self, ModelError> {
        for (expected, actual) in [
            (response.nrows(), data.len()),
            (response.nrows(), noise_variance.len()),
            (response.ncols(), prior_mean.len()),
        ] {
            if expected != actual {
                return Err(ModelError::DimensionMismatch { expected, actual });
            }
        }

        let inv_noise = noise_variance.map(|v| 1.0 / v);
        let inv_noise_sqrt = inv_noise.map(f64::sqrt);
        let projected_data = response.apply_adjoint(&data.component_mul(&inv_noise));

        Ok(Self {
            response,
            inv_noise,
            inv_noise_sqrt,
            projected_data,
            prior_mean,
            solver,
        })
    }

    /// Iterative solver settings.
    pub fn solver(&self) -> &ConjugateGradient {
        &self.solver
    }

    /// Right-hand side for the given fluctuations (`None` means zero).
    pub fn rhs(&self, inv_signal: &Vector, omega0: Option<&Vector>, omega1: Option<&Vector>) -> Vector {
        let mut rhs = &self.projected_data + inv_signal.component_mul(&self.prior_mean);
        if let Some(omega1) = omega1 {
            rhs += self
                .response
                .apply_adjoint(&self.inv_noise_sqrt.component_mul(omega1));
        }
        if let Some(omega0) = omega0 {
            rhs += inv_signal.map(f64::sqrt).component_mul(omega0);
        }
        rhs
    }

    /// Posterior mean for signal covariance `signal_variance`.
    pub fn wiener_filter(&self, signal_variance: &Vector, x0: Option<&Vector>) -> SolveResult {
        let inv_signal = signal_variance.map(|v| 1.0 / v);
        let rhs = self.rhs(&inv_signal, None, None);
        let lhs = PosteriorPrecision::new(self.response, &self.inv_noise, &inv_signal);
        self.solver.solve(&lhs, &rhs, x0)
    }

    /// One posterior draw for signal covariance `signal_variance`.
    ///
    /// ω₀ is drawn before ω₁, both from `rng`.
    pub fn draw<G: Rng + ?Sized>(
        &self,
        signal_variance: &Vector,
        x0: Option<&Vector>,
        rng: &mut G,
    ) -> SolveResult {
        let inv_signal = signal_variance.map(|v| 1.0 / v);
        let omega0 = standard_normal(self.response.ncols(), rng);
        let omega1 = standard_normal(self.response.nrows(), rng);
        let rhs = self.rhs(&inv_signal, Some(&omega0), Some(&omega1));
        let lhs = PosteriorPrecision::new(self.response, &self.inv_noise, &inv_signal);
        self.solver.solve(&lhs, &rhs, x0)
    }
}

fn standard_normal<G: Rng + ?Sized>(n: usize, rng: &mut G) -> Vector {
    Vector::from_fn(n, |_, _| StandardNormal.sample(&mut *rng))
}
