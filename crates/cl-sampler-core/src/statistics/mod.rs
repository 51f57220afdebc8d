//! Chain diagnostics.

mod ess;
mod online_stats;
mod trace;

pub use ess::{autocorrelation, effective_sample_size};
pub use online_stats::{OnlineStats, StatsSnapshot};
pub use trace::{EllSummary, SpectrumTrace};
