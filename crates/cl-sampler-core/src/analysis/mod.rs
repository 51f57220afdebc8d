//! Posterior sampling: operators, the CG solver and the two Gibbs conditionals.

mod gibbs;
mod operator;
mod power_spectrum;
mod solver;
mod wiener;

pub use gibbs::{ChainSample, ChainState, GibbsKernel};
pub use operator::{DiagonalOperator, LinearOperator, PosteriorPrecision};
pub use power_spectrum::{MonopolePolicy, PowerSpectrumSampler, SpectrumDraw, SpectrumPosterior};
pub use solver::{ConjugateGradient, SolveResult, SolverDiagnostics};
pub use wiener::ConstrainedRealization;
