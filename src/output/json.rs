//! JSON side files: configuration, precomputed quantities and timing.

use std::fs;
use std::path::Path;

use cl_sampler_core::analysis::SolverDiagnostics;
use cl_sampler_core::statistics::EllSummary;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Quantities fixed for the lifetime of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedOutput {
    /// Noise seed.
    pub data_seed: u64,
    /// Truth and prior seed.
    pub prior_seed: u64,
    /// Chain identifier.
    pub jobid: u64,
    /// Seed from which the per-iteration streams derive.
    pub chain_seed: u64,
    /// Band-limit.
    pub lmax: usize,
    /// HEALPix resolution.
    pub nside: usize,
    /// Ground-truth a_ℓm.
    pub truth_alm: Vec<f64>,
    /// Realized C_ℓ of the ground truth.
    pub truth_cl: Vec<f64>,
    /// Prior C_ℓ.
    pub prior_cl: Vec<f64>,
    /// Prior mean a₀.
    pub prior_mean: Vec<f64>,
    /// Diagonal prior covariance.
    pub prior_variance: Vec<f64>,
    /// Wiener-filter solution under the prior, when computed.
    pub wiener_alm: Option<Vec<f64>>,
    /// Diagnostics of the Wiener solve.
    pub wiener_solver: Option<SolverDiagnostics>,
    /// LST grid (hours).
    pub lst_hours: Vec<f64>,
    /// Observing frequencies (MHz).
    pub frequencies_mhz: Vec<f64>,
    /// Antenna ENU positions (m).
    pub antenna_positions: Vec<[f64; 3]>,
    /// Number of complex visibilities.
    pub n_visibilities: usize,
    /// Smallest per-component noise variance.
    pub noise_variance_min: f64,
    /// Largest per-component noise variance.
    pub noise_variance_max: f64,
    /// Time to build the models and the data term (s).
    pub precompute_seconds: f64,
}

/// Timings measured in profile mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileTiming {
    /// Model construction and data term (s).
    pub precompute_seconds: f64,
    /// Wiener warm-start solve (s), when performed.
    pub wiener_seconds: Option<f64>,
    /// Constrained-realization solve of the profiled iteration (s).
    pub solve_seconds: f64,
    /// CG iterations of the profiled iteration.
    pub solver_iterations: usize,
    /// Whole profiled iteration (s).
    pub iteration_seconds: f64,
}

/// Run timings and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingOutput {
    /// Model construction and data term (s).
    pub precompute_seconds: f64,
    /// Mean Gibbs iteration time (s).
    pub average_iteration_seconds: f64,
    /// Total run time (s).
    pub total_seconds: f64,
    /// Iterations executed in this run.
    pub iterations_run: usize,
    /// Chain lines on disk after the run.
    pub samples_written: usize,
    /// Iterations whose line could not be written.
    pub failed_writes: Vec<usize>,
    /// Iterations whose solve did not converge.
    pub nonconverged: Vec<usize>,
    /// Total clamped C_ℓ draws.
    pub clamped_draws: usize,
    /// Stopped before completion.
    pub cancelled: bool,
    /// Profile-mode breakdown.
    pub profile: Option<ProfileTiming>,
    /// Per-ℓ chain summary.
    pub summary: Vec<EllSummary>,
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

/// Read a JSON file written by [`write_json`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Serialize any run output to a compact JSON string.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize any run output to a pretty-printed JSON string.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> TimingOutput {
        TimingOutput {
            precompute_seconds: 1.5,
            average_iteration_seconds: 0.1 + 0.2,
            total_seconds: 3.0,
            iterations_run: 10,
            samples_written: 10,
            failed_writes: vec![],
            nonconverged: vec![4],
            clamped_draws: 0,
            cancelled: false,
            profile: None,
            summary: vec![EllSummary {
                ell: 0,
                mean: 1.0 / 3.0,
                std_dev: 0.1,
                autocorr_lag1: 0.2,
                ess: 9.5,
                count: 10,
            }],
        }
    }

    #[test]
    fn test_file_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing.json");
        let value = timing();
        write_json(&path, &value).unwrap();
        let back: TimingOutput = read_json(&path).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_json_contains_fields() {
        let json = to_json(&timing()).unwrap();
        assert!(json.contains("\"nonconverged\":[4]"));
        assert!(json.contains("\"profile\":null"));
        assert!(to_json_pretty(&timing()).unwrap().contains('\n'));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("timing.json");
        assert!(matches!(write_json(&path, &timing()), Err(Error::Io { .. })));
    }
}
