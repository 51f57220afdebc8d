//! Conjugate-gradient solver for symmetric positive-definite operators.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::operator::LinearOperator;
use crate::types::Vector;

/// Outcome of one iterative solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    /// Iterations performed.
    pub iterations: usize,
    /// Final ‖b − A x‖ / ‖b‖ (recurrence residual).
    pub relative_residual: f64,
    /// Whether the tolerance was met within the iteration cap.
    pub converged: bool,
    /// Wall time of the solve (s).
    pub solve_seconds: f64,
}

/// Solution vector with its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Approximate solution.
    pub x: Vector,
    /// Convergence information.
    pub diagnostics: SolverDiagnostics,
}

/// Unpreconditioned conjugate gradient.
///
/// Stops when ‖r‖ ≤ tol·‖b‖ or after `maxiter` iterations. Hitting the cap is
/// reported through [`SolverDiagnostics::converged`], never as an error; the
/// caller decides what an under-converged solution means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConjugateGradient {
    tol: f64,
    maxiter: usize,
}

impl ConjugateGradient {
    /// Solver with relative tolerance `tol` and iteration cap `maxiter`.
    pub fn new(tol: f64, maxiter: usize) -> Self {
        Self { tol, maxiter }
    }

    /// Relative tolerance.
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Iteration cap.
    pub fn maxiter(&self) -> usize {
        self.maxiter
    }

    /// Solve A x = b, starting from `x0` (zero if `None`).
    pub fn solve<A>(&self, a: &A, b: &Vector, x0: Option<&Vector>) -> SolveResult
    where
        A: LinearOperator + ?Sized,
    {
        let start = Instant::now();
        let finish = |x: Vector, iterations: usize, residual: f64, converged: bool| SolveResult {
            x,
            diagnostics: SolverDiagnostics {
                iterations,
                relative_residual: residual,
                converged,
                solve_seconds: start.elapsed().as_secs_f64(),
            },
        };

        let b_norm = b.norm();
        if b_norm == 0.0 {
            return finish(Vector::zeros(b.len()), 0, 0.0, true);
        }
        let threshold = self.tol * b_norm;

        let mut x = match x0 {
            Some(x0) => x0.clone(),
            None => Vector::zeros(b.len()),
        };
        let mut r = if x0.is_some() { b - a.apply(&x) } else { b.clone() };
        let mut rr = r.norm_squared();
        if rr.sqrt() <= threshold {
            return finish(x, 0, rr.sqrt() / b_norm, true);
        }

        let mut p = r.clone();
        for k in 1..=self.maxiter {
            let ap = a.apply(&p);
            let p_ap = p.dot(&ap);
            if !(p_ap.is_finite() && p_ap > 0.0) {
                tracing::warn!(
                    iteration = k,
                    curvature = p_ap,
                    "conjugate gradient breakdown: operator not positive definite along search direction"
                );
                return finish(x, k, rr.sqrt() / b_norm, false);
            }

            let alpha = rr / p_ap;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);
            let rr_next = r.norm_squared();
            if rr_next.sqrt() <= threshold {
                return finish(x, k, rr_next.sqrt() / b_norm, true);
            }

            let beta = rr_next / rr;
            p = &r + p * beta;
            rr = rr_next;
        }

        finish(x, self.maxiter, rr.sqrt() / b_norm, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DiagonalOperator;
    use crate::types::Matrix;

    #[test]
    fn test_diagonal_system_closed_form() {
        let d = Vector::from_vec(vec![1.0, 2.0, 5.0, 10.0, 0.5]);
        let b = Vector::from_vec(vec![1.0, -4.0, 2.5, 3.0, 1.0]);
        let op = DiagonalOperator::new(d.clone());
        let result = ConjugateGradient::new(1e-10, 100).solve(&op, &b, None);

        let exact = b.component_div(&d);
        assert!(result.diagnostics.converged);
        assert!(result.diagnostics.iterations <= 5);
        assert!((result.x - exact).amax() < 1e-9);
    }

    #[test]
    fn test_dense_spd_matches_cholesky() {
        let m = Matrix::from_row_slice(
            4,
            4,
            &[
                4.0, 1.0, 0.0, 0.5, //
                1.0, 3.0, 0.2, 0.0, //
                0.0, 0.2, 2.0, 0.1, //
                0.5, 0.0, 0.1, 1.5,
            ],
        );
        let b = Vector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let exact = m.clone().cholesky().unwrap().solve(&b);
        let result = ConjugateGradient::new(1e-12, 50).solve(&m, &b, None);
        assert!(result.diagnostics.converged);
        assert!((result.x - exact).amax() < 1e-9);
    }

    #[test]
    fn test_zero_rhs_returns_zero() {
        let op = DiagonalOperator::new(Vector::from_vec(vec![1.0, 2.0]));
        let result = ConjugateGradient::new(1e-8, 10).solve(&op, &Vector::zeros(2), None);
        assert_eq!(result.x, Vector::zeros(2));
        assert_eq!(result.diagnostics.iterations, 0);
        assert!(result.diagnostics.converged);
    }

    #[test]
    fn test_warm_start_at_solution_needs_no_iterations() {
        let d = Vector::from_vec(vec![2.0, 3.0]);
        let b = Vector::from_vec(vec![4.0, 9.0]);
        let x0 = Vector::from_vec(vec![2.0, 3.0]);
        let result = ConjugateGradient::new(1e-8, 10).solve(&DiagonalOperator::new(d), &b, Some(&x0));
        assert_eq!(result.diagnostics.iterations, 0);
        assert!(result.diagnostics.converged);
    }

    #[test]
    fn test_iteration_cap_is_reported() {
        let d = Vector::from_fn(50, |i, _| 1.0 + i as f64 * 10.0);
        let b = Vector::from_element(50, 1.0);
        let result = ConjugateGradient::new(1e-14, 2).solve(&DiagonalOperator::new(d), &b, None);
        assert!(!result.diagnostics.converged);
        assert_eq!(result.diagnostics.iterations, 2);
        assert!(result.diagnostics.relative_residual > 1e-14);
    }

    #[test]
    fn test_indefinite_operator_breaks_down() {
        let op = DiagonalOperator::new(Vector::from_vec(vec![1.0, -1.0]));
        let b = Vector::from_vec(vec![0.0, 1.0]);
        let result = ConjugateGradient::new(1e-8, 10).solve(&op, &b, None);
        assert!(!result.diagnostics.converged);
    }
}
