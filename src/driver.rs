//! Chain driver: builds the models, runs the Gibbs loop and persists samples.
//!
//! The driver moves through `Initializing → Sampling ⇄ Persisting → Done`,
//! or into `Failed` on a configuration, model or (under the abort policy)
//! solver error. Everything persisted before a failure or a stop request
//! stays valid and can be resumed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cl_sampler_core::analysis::{
    ConstrainedRealization, GibbsKernel, LinearOperator, PowerSpectrumSampler, SolverDiagnostics,
};
use cl_sampler_core::model::{GroundTruth, ObservationModel, PriorModel, ReferenceSpectrum};
use cl_sampler_core::statistics::{EllSummary, SpectrumTrace};
use cl_sampler_core::{AlmIndex, Vector};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{
    load_chain, read_json, write_json, ChainRecord, ChainWriter, PrecomputedOutput, ProfileTiming,
    TimingOutput,
};

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Building the prior and observation models.
    Initializing,
    /// Drawing a_ℓm and C_ℓ.
    Sampling,
    /// Handing a sample to the writer.
    Persisting,
    /// All iterations done, or stopped on request.
    Done,
    /// Stopped by an unrecoverable error.
    Failed,
}

/// Cooperative stop flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the chain to stop after the current iteration.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a completed (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Chain identifier.
    pub jobid: u64,
    /// Noise seed.
    pub data_seed: u64,
    /// Truth and prior seed.
    pub prior_seed: u64,
    /// Band-limit.
    pub lmax: usize,
    /// Final driver state.
    pub state: RunState,
    /// First iteration executed by this run (non-zero when resuming).
    pub first_iteration: usize,
    /// Iterations executed by this run.
    pub iterations_run: usize,
    /// Chain lines on disk.
    pub samples_written: usize,
    /// Iterations that could not be written.
    pub failed_writes: Vec<usize>,
    /// Iterations whose linear solve did not converge.
    pub nonconverged: Vec<usize>,
    /// Total clamped C_ℓ draws.
    pub clamped_draws: usize,
    /// Whether a stop request ended the run.
    pub cancelled: bool,
    /// Model construction time (s).
    pub precompute_seconds: f64,
    /// Mean iteration time (s).
    pub average_iteration_seconds: f64,
    /// Total wall time (s).
    pub total_seconds: f64,
    /// Last sampled C_ℓ.
    pub final_cl: Vec<f64>,
    /// Per-ℓ posterior summary over this run's samples.
    pub spectrum: Vec<EllSummary>,
}

type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Runs one chain to completion.
pub struct ChainRunner {
    config: Config,
    state: RunState,
    stop: StopHandle,
    progress: Option<ProgressCallback>,
}

impl ChainRunner {
    /// Validate `config` and prepare a runner.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RunState::Initializing,
            stop: StopHandle::new(),
            progress: None,
        })
    }

    /// Report `(completed, total)` after each iteration.
    pub fn on_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Flag that stops the chain between iterations.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the chain, inside a dedicated thread pool when `threads > 0`.
    pub fn run(&mut self) -> Result<RunSummary> {
        let result = self.run_in_pool();
        if result.is_err() {
            self.transition(RunState::Failed);
        }
        result
    }

    #[cfg(feature = "parallel")]
    fn run_in_pool(&mut self) -> Result<RunSummary> {
        if self.config.threads == 0 {
            return self.run_chain();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        pool.install(|| self.run_chain())
    }

    #[cfg(not(feature = "parallel"))]
    fn run_in_pool(&mut self) -> Result<RunSummary> {
        if self.config.threads > 1 {
            tracing::warn!(
                threads = self.config.threads,
                "built without the `parallel` feature; running single-threaded"
            );
        }
        self.run_chain()
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "driver state");
            self.state = next;
        }
    }

    fn run_chain(&mut self) -> Result<RunSummary> {
        let run_start = Instant::now();
        let config = self.config.clone();
        self.transition(RunState::Initializing);
        config.check_directory()?;
        if config.resume && config.chain_path().exists() {
            check_resumable(&config)?;
        }
        write_json(&config.config_path(), &config)?;

        // ---------------------------------------------------------------
        // Models (fixed for the whole chain)
        // ---------------------------------------------------------------
        let precompute_start = Instant::now();
        let seeds = config.seed_stream();
        let index = AlmIndex::new(config.lmax);
        let truth = GroundTruth::draw(index, &ReferenceSpectrum::default(), &seeds);
        let prior = PriorModel::build(&truth, index, &config.prior_settings(), &seeds)?;
        let observation = ObservationModel::simulate(&config.observation_spec(), &truth, &seeds)?;

        let realization = ConstrainedRealization::new(
            observation.response(),
            observation.data(),
            observation.noise_variance(),
            prior.mean().clone(),
            config.conjugate_gradient(),
        )?;
        let spectrum = PowerSpectrumSampler::new(
            index,
            config.spectrum_posterior(),
            config.monopole_policy(),
            config.front_factor,
            prior.cl()[0],
        );
        if spectrum.monopole() != config.monopole_policy() {
            tracing::info!("flat C_ell posterior is improper at ell = 0; monopole held fixed");
        }
        let kernel = GibbsKernel::new(realization, spectrum, prior.variance().clone(), seeds);

        // ---------------------------------------------------------------
        // Starting point: resumed chain or prior
        // ---------------------------------------------------------------
        let total = config.effective_samples();
        let chain_path = config.chain_path();
        let mut existing = Vec::new();
        if config.resume && chain_path.exists() {
            let loaded = load_chain(&chain_path)?;
            if loaded.skipped > 0 {
                tracing::warn!(skipped = loaded.skipped, "dropping unusable chain lines");
            }
            let mismatched = loaded.records.iter().find(|r| {
                r.jobid != config.jobid || r.alm.len() != index.len() || r.cl.len() != index.n_ell()
            });
            if let Some(bad) = mismatched {
                return Err(Error::ChainFile {
                    path: chain_path,
                    reason: format!(
                        "iteration {} does not match this configuration (jobid {}, lmax {})",
                        bad.iteration, config.jobid, config.lmax
                    ),
                });
            }
            existing = loaded.records;
        }

        let (mut state, first_iteration, wiener) = match existing.last() {
            Some(last) => {
                tracing::info!(
                    iteration = last.iteration,
                    records = existing.len(),
                    "resuming chain"
                );
                let state = kernel.state_from(last.alm_vector(), last.cl_vector());
                (state, last.iteration + 1, None)
            }
            None => {
                let wiener_start = Instant::now();
                let (state, diagnostics) =
                    kernel.initial_state(prior.cl(), config.wiener_warm_start);
                let wiener_seconds = wiener_start.elapsed().as_secs_f64();
                let wiener = diagnostics.map(|d| (state.alm.clone(), d, wiener_seconds));
                (state, 0, wiener)
            }
        };

        let precompute_seconds = precompute_start.elapsed().as_secs_f64();
        if existing.is_empty() || !config.precomputed_path().exists() {
            write_precomputed(
                &config,
                &truth,
                &prior,
                &observation,
                wiener.as_ref().map(|(alm, d, _)| (alm, *d)),
                precompute_seconds,
            )?;
        }
        tracing::info!(
            precompute_seconds,
            alm = index.len(),
            data = observation.response().nrows(),
            "models ready"
        );

        // ---------------------------------------------------------------
        // Gibbs loop
        // ---------------------------------------------------------------
        let mut writer = ChainWriter::create(&chain_path, &existing)?;
        let mut trace = SpectrumTrace::new(config.lmax);
        let mut nonconverged = Vec::new();
        let mut clamped_draws = 0;
        let mut iteration_seconds = 0.0;
        let mut iterations_run = 0;
        let mut cancelled = false;
        let mut final_cl = state.cl.as_slice().to_vec();
        let mut last_sample_solver: Option<(SolverDiagnostics, f64)> = None;
        let mut failure = None;

        for iteration in first_iteration..total {
            if self.stop.is_stopped() {
                tracing::info!(iteration, "stop requested");
                cancelled = true;
                break;
            }

            self.transition(RunState::Sampling);
            let sample = kernel.step(&state, iteration);
            iterations_run += 1;
            iteration_seconds += sample.seconds;
            clamped_draws += sample.clamped.len();
            trace.push(&sample.cl);
            final_cl = sample.cl.as_slice().to_vec();
            last_sample_solver = Some((sample.solver, sample.seconds));

            tracing::debug!(
                iteration,
                cg_iterations = sample.solver.iterations,
                residual = sample.solver.relative_residual,
                seconds = sample.seconds,
                "gibbs step"
            );

            let converged = sample.solver.converged;
            if !converged {
                tracing::warn!(
                    iteration,
                    cg_iterations = sample.solver.iterations,
                    residual = sample.solver.relative_residual,
                    tol = config.tol,
                    "linear solve did not converge"
                );
                nonconverged.push(iteration);
            }

            let abort = !converged && config.abort_on_nonconvergence;
            let last = iteration + 1 == total;
            if abort || last || (iteration + 1) % config.thin == 0 {
                self.transition(RunState::Persisting);
                writer.send(ChainRecord::from_sample(&sample, config.jobid));
            }

            if abort {
                failure = Some(Error::SolverNonConvergence {
                    iteration,
                    iterations: sample.solver.iterations,
                    residual: sample.solver.relative_residual,
                });
                break;
            }

            state = kernel.advance(&sample);
            if let Some(progress) = &self.progress {
                progress(iteration + 1, total);
            }
        }

        let report = writer.finish();
        let average_iteration_seconds = if iterations_run > 0 {
            iteration_seconds / iterations_run as f64
        } else {
            0.0
        };
        let spectrum = trace.summary();

        let profile = if config.profile {
            last_sample_solver.map(|(solver, seconds)| ProfileTiming {
                precompute_seconds,
                wiener_seconds: wiener.as_ref().map(|(_, _, s)| *s),
                solve_seconds: solver.solve_seconds,
                solver_iterations: solver.iterations,
                iteration_seconds: seconds,
            })
        } else {
            None
        };

        let total_seconds = run_start.elapsed().as_secs_f64();
        write_json(
            &config.timing_path(),
            &TimingOutput {
                precompute_seconds,
                average_iteration_seconds,
                total_seconds,
                iterations_run,
                samples_written: report.written,
                failed_writes: report.failed.clone(),
                nonconverged: nonconverged.clone(),
                clamped_draws,
                cancelled,
                profile,
                summary: spectrum.clone(),
            },
        )?;

        if let Some(error) = failure {
            tracing::error!(error = %error, "chain aborted");
            return Err(error);
        }

        self.transition(RunState::Done);
        tracing::info!(
            iterations = iterations_run,
            written = report.written,
            failed_writes = report.failed.len(),
            cancelled,
            total_seconds,
            "chain finished"
        );

        Ok(RunSummary {
            jobid: config.jobid,
            data_seed: config.data_seed,
            prior_seed: config.prior_seed,
            lmax: config.lmax,
            state: self.state,
            first_iteration,
            iterations_run,
            samples_written: report.written,
            failed_writes: report.failed,
            nonconverged,
            clamped_draws,
            cancelled,
            precompute_seconds,
            average_iteration_seconds,
            total_seconds,
            final_cl,
            spectrum,
        })
    }
}

fn write_precomputed(
    config: &Config,
    truth: &GroundTruth,
    prior: &PriorModel,
    observation: &ObservationModel,
    wiener: Option<(&Vector, SolverDiagnostics)>,
    precompute_seconds: f64,
) -> Result<()> {
    let noise = observation.noise_variance();
    let seeds = config.seed_stream();
    let output = PrecomputedOutput {
        data_seed: config.data_seed,
        prior_seed: config.prior_seed,
        jobid: config.jobid,
        chain_seed: seeds.chain_seed(),
        lmax: config.lmax,
        nside: config.nside,
        truth_alm: truth.alm.as_slice().to_vec(),
        truth_cl: truth.cl.as_slice().to_vec(),
        prior_cl: prior.cl().as_slice().to_vec(),
        prior_mean: prior.mean().as_slice().to_vec(),
        prior_variance: prior.variance().as_slice().to_vec(),
        wiener_alm: wiener.map(|(alm, _)| alm.as_slice().to_vec()),
        wiener_solver: wiener.map(|(_, d)| d),
        lst_hours: observation.spec().lst_hours(),
        frequencies_mhz: observation.spec().frequencies_mhz.clone(),
        antenna_positions: observation.array().antennas().iter().map(|a| a.enu).collect(),
        n_visibilities: observation.response().n_visibilities(),
        noise_variance_min: noise.min(),
        noise_variance_max: noise.max(),
        precompute_seconds,
    };
    write_json(&config.precomputed_path(), &output)
}

/// Refuse to continue a chain whose archived configuration simulated other
/// data or another prior.
fn check_resumable(config: &Config) -> Result<()> {
    let archived_path = config.config_path();
    if !archived_path.is_file() {
        return Err(Error::ChainFile {
            path: config.chain_path(),
            reason: format!(
                "cannot resume without the archived configuration {}",
                archived_path.display()
            ),
        });
    }
    let archived: Config = read_json(&archived_path)?;
    let changed = config.model_differences(&archived);
    if changed.is_empty() {
        return Ok(());
    }
    Err(Error::ChainFile {
        path: config.chain_path(),
        reason: format!("resume changes model settings: {}", changed.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(dir: &std::path::Path) -> Config {
        Config::quick().directory(dir).number_of_samples(3)
    }

    #[test]
    fn test_stop_handle_is_shared() {
        let a = StopHandle::new();
        let b = a.clone();
        assert!(!b.is_stopped());
        a.stop();
        assert!(b.is_stopped());
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        assert!(matches!(
            ChainRunner::new(Config::quick().number_of_samples(0)),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_missing_directory_fails_run() {
        let mut runner =
            ChainRunner::new(Config::quick().directory("/nonexistent/cl-sampler")).unwrap();
        assert!(matches!(runner.run(), Err(Error::MissingOutputDirectory(_))));
        assert_eq!(runner.state(), RunState::Failed);
    }

    #[test]
    fn test_run_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ChainRunner::new(quick(dir.path())).unwrap();
        let summary = runner.run().unwrap();
        assert_eq!(runner.state(), RunState::Done);
        assert_eq!(summary.state, RunState::Done);
        assert_eq!(summary.iterations_run, 3);
        assert_eq!(summary.samples_written, 3);
        assert_eq!(summary.spectrum.len(), 5);
        assert!(summary.final_cl.iter().all(|&c| c >= 0.0));
    }

    #[test]
    fn test_stop_before_start_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ChainRunner::new(quick(dir.path())).unwrap();
        runner.stop_handle().stop();
        let summary = runner.run().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.iterations_run, 0);
        assert_eq!(summary.state, RunState::Done);
    }

    #[test]
    fn test_thinning_keeps_last_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick(dir.path()).number_of_samples(5).thin(2);
        let mut runner = ChainRunner::new(config.clone()).unwrap();
        runner.run().unwrap();
        let chain = load_chain(&config.chain_path()).unwrap();
        let iterations: Vec<usize> = chain.records.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![1, 3, 4]);
    }

    #[test]
    fn test_abort_policy_persists_offending_sample() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick(dir.path())
            .solver(1e-14, 1)
            .abort_on_nonconvergence(true);
        let mut runner = ChainRunner::new(config.clone()).unwrap();
        assert!(matches!(
            runner.run(),
            Err(Error::SolverNonConvergence { iteration: 0, .. })
        ));
        assert_eq!(runner.state(), RunState::Failed);
        let chain = load_chain(&config.chain_path()).unwrap();
        assert_eq!(chain.records.len(), 1);
        assert!(!chain.records[0].solver.converged);
    }
}
