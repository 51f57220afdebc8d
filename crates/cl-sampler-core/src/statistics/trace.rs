//! Per-multipole chain traces and their summaries.

use serde::{Deserialize, Serialize};

use super::ess::effective_sample_size;
use super::online_stats::OnlineStats;
use crate::types::Vector;

/// Posterior summary of C_ℓ at one multipole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllSummary {
    /// Multipole.
    pub ell: usize,
    /// Posterior mean of C_ℓ.
    pub mean: f64,
    /// Posterior standard deviation of C_ℓ.
    pub std_dev: f64,
    /// Lag-1 autocorrelation of the C_ℓ chain.
    pub autocorr_lag1: f64,
    /// Effective sample size.
    pub ess: f64,
    /// Number of samples.
    pub count: usize,
}

/// Accumulates sampled spectra.
#[derive(Debug, Clone)]
pub struct SpectrumTrace {
    chains: Vec<Vec<f64>>,
    stats: Vec<OnlineStats>,
}

impl SpectrumTrace {
    /// Empty trace for ℓ = 0..=lmax.
    pub fn new(lmax: usize) -> Self {
        Self {
            chains: vec![Vec::new(); lmax + 1],
            stats: vec![OnlineStats::new(); lmax + 1],
        }
    }

    /// Append one sampled spectrum.
    ///
    /// Extra entries beyond lmax are ignored.
    pub fn push(&mut self, cl: &Vector) {
        for ((chain, stats), &c) in self.chains.iter_mut().zip(&mut self.stats).zip(cl.iter()) {
            chain.push(c);
            stats.update(c);
        }
    }

    /// Number of spectra pushed.
    pub fn len(&self) -> usize {
        self.stats.first().map_or(0, OnlineStats::count)
    }

    /// Whether nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// C_ℓ chain at multipole `ell`.
    pub fn chain(&self, ell: usize) -> Option<&[f64]> {
        self.chains.get(ell).map(Vec::as_slice)
    }

    /// Per-ℓ summaries.
    pub fn summary(&self) -> Vec<EllSummary> {
        self.stats
            .iter()
            .zip(&self.chains)
            .enumerate()
            .map(|(ell, (stats, chain))| {
                let snapshot = stats.finalize();
                EllSummary {
                    ell,
                    mean: snapshot.mean,
                    std_dev: snapshot.std_dev(),
                    autocorr_lag1: snapshot.autocorr_lag1,
                    ess: effective_sample_size(chain),
                    count: snapshot.count,
                }
            })
            .collect()
    }
}
