//! Run configuration for the Gibbs sampler.
//!
//! A `Config` is built once (from the command line or the builder methods),
//! validated, archived next to the chain, and never mutated afterwards.

use std::path::PathBuf;

use cl_sampler_core::analysis::{ConjugateGradient, MonopolePolicy, SpectrumPosterior};
use cl_sampler_core::harmonics::DEFAULT_ANALYSIS_ITERATIONS;
use cl_sampler_core::model::{ObservationSpec, PriorMean, PriorSettings};
use cl_sampler_core::SeedStream;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // =========================================================================
    // Run identity and output
    // =========================================================================
    /// Existing directory receiving all output files. Default: "output".
    pub directory: PathBuf,

    /// Seed of the noise realization. Default: 10.
    pub data_seed: u64,

    /// Seed of the ground truth and prior. Default: 20.
    pub prior_seed: u64,

    /// Chain identifier, distinguishing parallel chains. Default: 0.
    pub jobid: u64,

    // =========================================================================
    // Chain length and policies
    // =========================================================================
    /// Gibbs iterations to run. Default: 100.
    pub number_of_samples: usize,

    /// Use the flat-prior (wider) C_ℓ posterior and inflate the prior by
    /// cosmic variance. Default: false.
    pub cosmic_variance: bool,

    /// Run a single timed iteration. Default: false.
    pub profile: bool,

    /// Persist every `thin`-th iteration (the last one always). Default: 1.
    pub thin: usize,

    /// Hold C_0 at its prior value instead of sampling it. Default: false.
    pub fix_monopole: bool,

    /// Prior mean policy. Default: zero.
    pub prior_mean: PriorMean,

    /// Multiplier on the monopole prior and posterior. Default: 1.0.
    pub front_factor: f64,

    /// Stop the chain when a solve does not converge. Default: false.
    pub abort_on_nonconvergence: bool,

    /// Start the chain from the Wiener filter. Default: true.
    pub wiener_warm_start: bool,

    /// Continue an existing chain file. Default: false.
    pub resume: bool,

    // =========================================================================
    // Linear solver
    // =========================================================================
    /// Relative CG tolerance. Default: 1e-5.
    pub tol: f64,

    /// CG iteration cap. Default: 20000.
    pub maxiter: usize,

    // =========================================================================
    // Sky model and instrument
    // =========================================================================
    /// Band-limit. Default: 20.
    pub lmax: usize,

    /// HEALPix resolution. Default: 128.
    pub nside: usize,

    /// Observing frequencies (MHz). Default: [100].
    pub frequencies_mhz: Vec<f64>,

    /// Number of LST samples. Default: 10.
    pub n_lst: usize,

    /// First LST (hours). Default: 0.
    pub lst_start: f64,

    /// Last LST (hours). Default: 8.
    pub lst_end: f64,

    /// Hexagonal array spacing (m). Default: 14.6.
    pub ant_distance: f64,

    /// Dish diameter (m). Default: 14.0.
    pub dish_diameter: f64,

    /// Array latitude (degrees). Default: −30.7215.
    pub latitude: f64,

    /// Frequency at which a_ℓm are defined (MHz). Default: 100.
    pub reference_frequency: f64,

    /// Sky spectral index. Default: −2.55.
    pub spectral_index: f64,

    /// Jacobi passes in map-to-alm analysis. Default: 3.
    pub sht_iterations: usize,

    // =========================================================================
    // Resources
    // =========================================================================
    /// Worker threads (0 = rayon default). Default: 0.
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        let observation = ObservationSpec::default();
        Self {
            directory: PathBuf::from("output"),
            data_seed: 10,
            prior_seed: 20,
            jobid: 0,

            number_of_samples: 100,
            cosmic_variance: false,
            profile: false,
            thin: 1,
            fix_monopole: false,
            prior_mean: PriorMean::Zero,
            front_factor: 1.0,
            abort_on_nonconvergence: false,
            wiener_warm_start: true,
            resume: false,

            tol: 1e-5,
            maxiter: 20_000,

            lmax: observation.lmax,
            nside: observation.nside,
            frequencies_mhz: observation.frequencies_mhz,
            n_lst: observation.n_lst,
            lst_start: observation.lst_start_hours,
            lst_end: observation.lst_end_hours,
            ant_distance: observation.ant_distance,
            dish_diameter: observation.dish_diameter,
            latitude: observation.latitude_deg,
            reference_frequency: observation.reference_frequency_mhz,
            spectral_index: observation.spectral_index,
            sht_iterations: DEFAULT_ANALYSIS_ITERATIONS,

            threads: 0,
        }
    }
}

impl Config {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Small configuration for smoke runs: lmax 4, nside 8, three LSTs,
    /// five samples.
    pub fn quick() -> Self {
        Self {
            lmax: 4,
            nside: 8,
            n_lst: 3,
            number_of_samples: 5,
            tol: 1e-8,
            maxiter: 2_000,
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the output directory.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the data and prior seeds.
    pub fn seeds(mut self, data_seed: u64, prior_seed: u64) -> Self {
        self.data_seed = data_seed;
        self.prior_seed = prior_seed;
        self
    }

    /// Set the chain identifier.
    pub fn jobid(mut self, jobid: u64) -> Self {
        self.jobid = jobid;
        self
    }

    /// Set the number of Gibbs iterations.
    pub fn number_of_samples(mut self, n: usize) -> Self {
        self.number_of_samples = n;
        self
    }

    /// Toggle the cosmic-variance posterior and prior inflation.
    pub fn cosmic_variance(mut self, enabled: bool) -> Self {
        self.cosmic_variance = enabled;
        self
    }

    /// Toggle profile mode.
    pub fn profile(mut self, enabled: bool) -> Self {
        self.profile = enabled;
        self
    }

    /// Set the CG tolerance and iteration cap.
    pub fn solver(mut self, tol: f64, maxiter: usize) -> Self {
        self.tol = tol;
        self.maxiter = maxiter;
        self
    }

    /// Set band-limit and resolution.
    pub fn resolution(mut self, lmax: usize, nside: usize) -> Self {
        self.lmax = lmax;
        self.nside = nside;
        self
    }

    /// Set the observing frequencies (MHz).
    pub fn frequencies(mut self, frequencies_mhz: Vec<f64>) -> Self {
        self.frequencies_mhz = frequencies_mhz;
        self
    }

    /// Set the LST grid.
    pub fn lst(mut self, n_lst: usize, start_hours: f64, end_hours: f64) -> Self {
        self.n_lst = n_lst;
        self.lst_start = start_hours;
        self.lst_end = end_hours;
        self
    }

    /// Set the monopole front factor.
    pub fn front_factor(mut self, front_factor: f64) -> Self {
        self.front_factor = front_factor;
        self
    }

    /// Set the thinning interval.
    pub fn thin(mut self, thin: usize) -> Self {
        self.thin = thin;
        self
    }

    /// Set the worker thread count (0 = rayon default).
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Hold the monopole fixed.
    pub fn fix_monopole(mut self, fixed: bool) -> Self {
        self.fix_monopole = fixed;
        self
    }

    /// Set the prior mean policy.
    pub fn prior_mean(mut self, mean: PriorMean) -> Self {
        self.prior_mean = mean;
        self
    }

    /// Abort the chain on a non-converged solve.
    pub fn abort_on_nonconvergence(mut self, abort: bool) -> Self {
        self.abort_on_nonconvergence = abort;
        self
    }

    /// Toggle the Wiener-filter warm start.
    pub fn wiener_warm_start(mut self, enabled: bool) -> Self {
        self.wiener_warm_start = enabled;
        self
    }

    /// Continue an existing chain.
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    // =========================================================================
    // Derived settings
    // =========================================================================

    /// Iterations actually run: 1 in profile mode.
    pub fn effective_samples(&self) -> usize {
        if self.profile {
            1
        } else {
            self.number_of_samples
        }
    }

    /// Seed derivation for this chain.
    pub fn seed_stream(&self) -> SeedStream {
        SeedStream::new(self.data_seed, self.prior_seed, self.jobid)
    }

    /// Instrument and observing parameters.
    pub fn observation_spec(&self) -> ObservationSpec {
        ObservationSpec {
            lmax: self.lmax,
            nside: self.nside,
            frequencies_mhz: self.frequencies_mhz.clone(),
            reference_frequency_mhz: self.reference_frequency,
            spectral_index: self.spectral_index,
            n_lst: self.n_lst,
            lst_start_hours: self.lst_start,
            lst_end_hours: self.lst_end,
            latitude_deg: self.latitude,
            ant_distance: self.ant_distance,
            dish_diameter: self.dish_diameter,
            sht_iterations: self.sht_iterations,
        }
    }

    /// Prior parameters.
    pub fn prior_settings(&self) -> PriorSettings {
        PriorSettings {
            cosmic_variance: self.cosmic_variance,
            front_factor: self.front_factor,
            mean: self.prior_mean,
        }
    }

    /// CG solver.
    pub fn conjugate_gradient(&self) -> ConjugateGradient {
        ConjugateGradient::new(self.tol, self.maxiter)
    }

    /// C_ℓ posterior family.
    pub fn spectrum_posterior(&self) -> SpectrumPosterior {
        SpectrumPosterior::from_cosmic_variance(self.cosmic_variance)
    }

    /// Requested monopole policy.
    pub fn monopole_policy(&self) -> MonopolePolicy {
        if self.fix_monopole {
            MonopolePolicy::Fixed
        } else {
            MonopolePolicy::Sample
        }
    }

    // =========================================================================
    // Output files
    // =========================================================================

    /// `config_<jobid>.json`
    pub fn config_path(&self) -> PathBuf {
        self.directory.join(format!("config_{}.json", self.jobid))
    }

    /// `precomputed_<data_seed>_<jobid>.json`
    pub fn precomputed_path(&self) -> PathBuf {
        self.directory
            .join(format!("precomputed_{}_{}.json", self.data_seed, self.jobid))
    }

    /// `chain_<data_seed>_<jobid>.jsonl`
    pub fn chain_path(&self) -> PathBuf {
        self.directory
            .join(format!("chain_{}_{}.jsonl", self.data_seed, self.jobid))
    }

    /// `timing_<data_seed>_<jobid>.json`
    pub fn timing_path(&self) -> PathBuf {
        self.directory
            .join(format!("timing_{}_{}.json", self.data_seed, self.jobid))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check the configuration before anything is built.
    ///
    /// Does not touch the filesystem; the output directory is checked when
    /// the chain starts.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_samples == 0 {
            return Err(Error::config("number_of_samples", "must be at least 1"));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(Error::config("tol", format!("must be positive, got {}", self.tol)));
        }
        if self.maxiter == 0 {
            return Err(Error::config("maxiter", "must be at least 1"));
        }
        if self.thin == 0 {
            return Err(Error::config("thin", "must be at least 1"));
        }
        if !(self.front_factor.is_finite() && self.front_factor > 0.0) {
            return Err(Error::config(
                "front_factor",
                format!("must be positive, got {}", self.front_factor),
            ));
        }
        if self.resume && self.profile {
            return Err(Error::config("resume", "cannot be combined with profile"));
        }
        self.observation_spec().validate()?;
        Ok(())
    }

    /// Names of the settings that define the simulated data or the prior and
    /// differ between `self` and `other`.
    ///
    /// A chain can only be continued under a configuration for which this is
    /// empty. Run length and solver settings may change freely.
    pub fn model_differences(&self, other: &Config) -> Vec<&'static str> {
        let fields = [
            ("data_seed", self.data_seed == other.data_seed),
            ("prior_seed", self.prior_seed == other.prior_seed),
            ("jobid", self.jobid == other.jobid),
            ("lmax", self.lmax == other.lmax),
            ("nside", self.nside == other.nside),
            ("frequencies_mhz", self.frequencies_mhz == other.frequencies_mhz),
            ("n_lst", self.n_lst == other.n_lst),
            ("lst_start", self.lst_start == other.lst_start),
            ("lst_end", self.lst_end == other.lst_end),
            ("ant_distance", self.ant_distance == other.ant_distance),
            ("dish_diameter", self.dish_diameter == other.dish_diameter),
            ("latitude", self.latitude == other.latitude),
            ("reference_frequency", self.reference_frequency == other.reference_frequency),
            ("spectral_index", self.spectral_index == other.spectral_index),
            ("sht_iterations", self.sht_iterations == other.sht_iterations),
            ("cosmic_variance", self.cosmic_variance == other.cosmic_variance),
            ("front_factor", self.front_factor == other.front_factor),
            ("fix_monopole", self.fix_monopole == other.fix_monopole),
            ("prior_mean", self.prior_mean == other.prior_mean),
        ];
        fields
            .into_iter()
            .filter(|&(_, same)| !same)
            .map(|(name, _)| name)
            .collect()
    }

    /// Fail unless the output directory exists.
    pub fn check_directory(&self) -> Result<()> {
        if self.directory.is_dir() {
            Ok(())
        } else {
            Err(Error::MissingOutputDirectory(self.directory.clone()))
        }
    }
}

/// Parse a boolean option: {true, yes, t, y, 1} or {false, no, f, n, 0},
/// case-insensitively.
pub fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "t" | "y" | "1" => Ok(true),
        "false" | "no" | "f" | "n" | "0" => Ok(false),
        other => Err(format!("boolean value expected, got '{other}'")),
    }
}

/// Parse a comma-separated list of frequencies in MHz.
pub fn parse_frequencies(value: &str) -> std::result::Result<Vec<f64>, String> {
    let frequencies = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|e| format!("invalid frequency '{s}': {e}"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if frequencies.is_empty() {
        return Err("at least one frequency is required".to_string());
    }
    Ok(frequencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_sampler_core::ModelError;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.directory, PathBuf::from("output"));
        assert_eq!(config.data_seed, 10);
        assert_eq!(config.prior_seed, 20);
        assert_eq!(config.jobid, 0);
        assert_eq!(config.number_of_samples, 100);
        assert!(!config.cosmic_variance);
        assert_eq!(config.tol, 1e-5);
        assert_eq!(config.maxiter, 20_000);
        assert_eq!(config.lmax, 20);
        assert_eq!(config.nside, 128);
        assert_eq!(config.frequencies_mhz, vec![100.0]);
        assert_eq!(config.n_lst, 10);
        assert_eq!((config.lst_start, config.lst_end), (0.0, 8.0));
        assert_eq!(config.ant_distance, 14.6);
        assert_eq!(config.dish_diameter, 14.0);
        assert_eq!(config.front_factor, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = Config::new()
            .seeds(1, 2)
            .jobid(7)
            .number_of_samples(3)
            .solver(1e-7, 500)
            .resolution(6, 8)
            .lst(4, 1.0, 2.0);
        assert_eq!((config.data_seed, config.prior_seed, config.jobid), (1, 2, 7));
        assert_eq!(config.number_of_samples, 3);
        assert_eq!(config.conjugate_gradient(), ConjugateGradient::new(1e-7, 500));
        let spec = config.observation_spec();
        assert_eq!((spec.lmax, spec.nside, spec.n_lst), (6, 8, 4));
        assert_eq!(config.chain_path(), PathBuf::from("output/chain_1_7.jsonl"));
        assert_eq!(config.config_path(), PathBuf::from("output/config_7.json"));
    }

    #[test]
    fn test_profile_runs_one_iteration() {
        let config = Config::quick().number_of_samples(50).profile(true);
        assert_eq!(config.effective_samples(), 1);
    }

    #[test]
    fn test_policies_follow_flags() {
        let config = Config::new().cosmic_variance(true).fix_monopole(true);
        assert_eq!(config.spectrum_posterior(), SpectrumPosterior::Flat);
        assert_eq!(config.monopole_policy(), MonopolePolicy::Fixed);
        assert!(config.prior_settings().cosmic_variance);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            Config::new().number_of_samples(0).validate(),
            Err(Error::Configuration { field: "number_of_samples", .. })
        ));
        assert!(matches!(
            Config::new().solver(-1.0, 10).validate(),
            Err(Error::Configuration { field: "tol", .. })
        ));
        assert!(matches!(
            Config::new().front_factor(0.0).validate(),
            Err(Error::Configuration { field: "front_factor", .. })
        ));
        assert!(matches!(
            Config::new().resolution(40, 8).validate(),
            Err(Error::Model(ModelError::UnresolvedBandLimit { .. }))
        ));
        assert!(matches!(
            Config::new().lst(5, 8.0, 2.0).validate(),
            Err(Error::Model(ModelError::InvalidLstRange { .. }))
        ));
    }

    #[test]
    fn test_missing_directory() {
        let config = Config::new().directory("/nonexistent/cl-sampler-output");
        assert!(matches!(
            config.check_directory(),
            Err(Error::MissingOutputDirectory(_))
        ));
    }

    #[test]
    fn test_parse_bool() {
        for s in ["true", "Yes", "t", "Y", "1"] {
            assert_eq!(parse_bool(s), Ok(true));
        }
        for s in ["false", "NO", "f", "n", "0"] {
            assert_eq!(parse_bool(s), Ok(false));
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_parse_frequencies() {
        assert_eq!(parse_frequencies("100"), Ok(vec![100.0]));
        assert_eq!(parse_frequencies("100, 120,140"), Ok(vec![100.0, 120.0, 140.0]));
        assert!(parse_frequencies("").is_err());
        assert!(parse_frequencies("100,abc").is_err());
    }

    #[test]
    fn test_model_differences() {
        let config = Config::quick();
        let longer = config.clone().number_of_samples(50).solver(1e-9, 100).resume(true);
        assert!(config.model_differences(&longer).is_empty());

        let reseeded = config.clone().seeds(config.data_seed, config.prior_seed + 1);
        assert_eq!(config.model_differences(&reseeded), vec!["prior_seed"]);

        let other = config.clone().resolution(3, 16).cosmic_variance(!config.cosmic_variance);
        assert_eq!(
            config.model_differences(&other),
            vec!["lmax", "nside", "cosmic_variance"]
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = Config::quick().prior_mean(PriorMean::PerturbedTruth);
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_parse_bool_ignores_case_and_padding(
            word in prop::sample::select(vec!["true", "yes", "t", "y", "1", "false", "no", "f", "n", "0"]),
            upper in prop::collection::vec(any::<bool>(), 5),
            left in 0usize..3,
            right in 0usize..3,
        ) {
            let cased: String = word
                .chars()
                .zip(upper.iter().cycle())
                .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c })
                .collect();
            let padded = format!("{}{}{}", " ".repeat(left), cased, "\t".repeat(right));
            let expected = matches!(word, "true" | "yes" | "t" | "y" | "1");
            prop_assert_eq!(parse_bool(&padded), Ok(expected));
        }

        #[test]
        fn prop_parse_bool_rejects_other_words(word in "[a-z]{2,8}") {
            prop_assume!(!["true", "yes", "false", "no"].contains(&word.as_str()));
            prop_assert!(parse_bool(&word).is_err());
        }

        #[test]
        fn prop_parse_frequencies_round_trips(
            frequencies in prop::collection::vec(0.1f64..1e4, 1..6),
        ) {
            let text = frequencies
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            prop_assert_eq!(parse_frequencies(&text), Ok(frequencies));
        }
    }
}
