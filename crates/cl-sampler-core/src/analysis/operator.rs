//! Matrix-free linear operators.

use crate::types::{Matrix, Vector};

/// A real linear map known only through its action on vectors.
pub trait LinearOperator: Send + Sync {
    /// Output dimension.
    fn nrows(&self) -> usize;

    /// Input dimension.
    fn ncols(&self) -> usize;

    /// y = A x.
    fn apply(&self, x: &Vector) -> Vector;

    /// x = Aᵀ y.
    fn apply_adjoint(&self, y: &Vector) -> Vector;
}

impl LinearOperator for Matrix {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn apply(&self, x: &Vector) -> Vector {
        self * x
    }

    fn apply_adjoint(&self, y: &Vector) -> Vector {
        self.tr_mul(y)
    }
}

/// Diagonal operator diag(d).
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalOperator {
    diagonal: Vector,
}

impl DiagonalOperator {
    /// Operator with the given diagonal.
    pub fn new(diagonal: Vector) -> Self {
        Self { diagonal }
    }

    /// Diagonal entries.
    pub fn diagonal(&self) -> &Vector {
        &self.diagonal
    }
}

impl LinearOperator for DiagonalOperator {
    fn nrows(&self) -> usize {
        self.diagonal.len()
    }

    fn ncols(&self) -> usize {
        self.diagonal.len()
    }

    fn apply(&self, x: &Vector) -> Vector {
        self.diagonal.component_mul(x)
    }

    fn apply_adjoint(&self, y: &Vector) -> Vector {
        self.apply(y)
    }
}

/// Posterior precision Rᵀ N⁻¹ R + S⁻¹ with diagonal N and S.
pub struct PosteriorPrecision<'a, R: LinearOperator + ?Sized> {
    response: &'a R,
    inv_noise: &'a Vector,
    inv_signal: &'a Vector,
}

impl<'a, R: LinearOperator + ?Sized> PosteriorPrecision<'a, R> {
    /// Combine a response with inverse noise and inverse signal variances.
    pub fn new(response: &'a R, inv_noise: &'a Vector, inv_signal: &'a Vector) -> Self {
        debug_assert_eq!(inv_noise.len(), response.nrows());
        debug_assert_eq!(inv_signal.len(), response.ncols());
        Self {
            response,
            inv_noise,
            inv_signal,
        }
    }
}

impl<R: LinearOperator + ?Sized> LinearOperator for PosteriorPrecision<'_, R> {
    fn nrows(&self) -> usize {
        self.response.ncols()
    }

    fn ncols(&self) -> usize {
        self.response.ncols()
    }

    fn apply(&self, x: &Vector) -> Vector {
        let weighted = self.response.apply(x).component_mul(self.inv_noise);
        self.response.apply_adjoint(&weighted) + self.inv_signal.component_mul(x)
    }

    fn apply_adjoint(&self, y: &Vector) -> Vector {
        self.apply(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_operator_matches_matrix_product() {
        let a = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let x = Vector::from_vec(vec![1.0, 0.0, -1.0]);
        let y = Vector::from_vec(vec![1.0, 1.0]);
        assert_eq!(a.apply(&x), Vector::from_vec(vec![-2.0, -2.0]));
        assert_eq!(a.apply_adjoint(&y), Vector::from_vec(vec![5.0, 7.0, 9.0]));
    }

    #[test]
    fn test_posterior_precision_matches_dense_form() {
        let r = Matrix::from_row_slice(3, 2, &[1.0, 0.5, 0.0, 2.0, 1.0, 1.0]);
        let inv_n = Vector::from_vec(vec![2.0, 1.0, 0.5]);
        let inv_s = Vector::from_vec(vec![0.1, 0.2]);
        let op = PosteriorPrecision::new(&r, &inv_n, &inv_s);

        let dense = r.transpose() * Matrix::from_diagonal(&inv_n) * &r
            + Matrix::from_diagonal(&inv_s);
        let x = Vector::from_vec(vec![0.3, -1.2]);
        let diff = (op.apply(&x) - &dense * &x).amax();
        assert!(diff < 1e-12);
        assert_eq!(op.nrows(), 2);
    }
}
