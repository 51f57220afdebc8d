//! Index-parallel map used by the transforms and operators.
//!
//! Work items are independent and results are collected in index order.
//! Callers reduce the collected results sequentially, which keeps floating
//! point sums identical with and without the `parallel` feature.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Evaluate `f(i)` for `i in 0..n` and collect the results in order.
#[cfg(feature = "parallel")]
pub(crate) fn map_indexed<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..n).into_par_iter().map(f).collect()
}

/// Evaluate `f(i)` for `i in 0..n` and collect the results in order.
#[cfg(not(feature = "parallel"))]
pub(crate) fn map_indexed<T, F>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T,
{
    (0..n).map(f).collect()
}
