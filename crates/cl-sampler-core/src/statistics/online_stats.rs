//! Streaming mean, variance and lag-1 autocorrelation (Welford's algorithm).
//!
//! One accumulator per multipole follows a chain as it is produced, with O(1)
//! memory per ℓ.

use serde::{Deserialize, Serialize};

/// Welford accumulator with a running lag-1 autocovariance.
///
/// # Example
///
/// ```
/// use cl_sampler_core::statistics::OnlineStats;
///
/// let mut stats = OnlineStats::new();
/// for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
///     stats.update(x);
/// }
/// assert!((stats.finalize().mean - 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OnlineStats {
    count: usize,
    mean: f64,
    /// Σ (x_i − mean)², updated incrementally.
    m2: f64,
    prev: f64,
    /// Σ (x_i − mean)(x_{i−1} − mean) using the running mean.
    lag1_sum: f64,
}

impl OnlineStats {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chain value.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);

        if self.count > 1 {
            self.lag1_sum += (x - self.mean) * (self.prev - self.mean);
        }
        self.prev = x;
    }

    /// Number of values seen.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Running mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n − 1 denominator), 0 below two values.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Current statistics.
    pub fn finalize(&self) -> StatsSnapshot {
        let variance = self.variance();
        let autocorr_lag1 = if self.count > 1 && variance > 1e-300 {
            let autocovariance = self.lag1_sum / (self.count - 1) as f64;
            (autocovariance / variance).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        StatsSnapshot {
            mean: self.mean,
            variance,
            autocorr_lag1,
            count: self.count,
        }
    }
}

/// Point-in-time summary of an [`OnlineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Sample mean.
    pub mean: f64,
    /// Sample variance.
    pub variance: f64,
    /// Lag-1 autocorrelation in [−1, 1].
    pub autocorr_lag1: f64,
    /// Number of values.
    pub count: usize,
}

impl StatsSnapshot {
    /// Standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}
