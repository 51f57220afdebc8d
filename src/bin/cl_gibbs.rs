//! Command-line driver for one Gibbs chain.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: lmax 20, nside 128, 100 samples into ./output
//! cl-gibbs --directory output
//!
//! # Small multi-frequency run with the cosmic-variance posterior
//! cl-gibbs --dir runs --lmax 10 --nside 32 --freq 100,120 --cosmic_var yes --nsamples 50
//!
//! # Time a single iteration
//! cl-gibbs --dir runs --profile true
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cl_sampler::output::format_summary;
use cl_sampler::{parse_bool, parse_frequencies, ChainRunner, Config, PriorMean};

/// Gibbs sampler for sky a_lm and angular power spectra from drift-scan data
#[derive(Parser, Debug)]
#[command(name = "cl-gibbs")]
#[command(version)]
struct Args {
    /// Existing output directory
    #[arg(long, visible_alias = "dir")]
    directory: Option<PathBuf>,

    /// Seed of the noise realization
    #[arg(long = "data_seed")]
    data_seed: Option<u64>,

    /// Seed of the ground truth and prior
    #[arg(long = "prior_seed")]
    prior_seed: Option<u64>,

    /// Chain identifier
    #[arg(long)]
    jobid: Option<u64>,

    /// Number of Gibbs iterations
    #[arg(long = "number_of_samples", visible_alias = "nsamples")]
    number_of_samples: Option<usize>,

    /// Flat C_l posterior plus cosmic-variance prior inflation
    #[arg(long = "cosmic_variance", visible_alias = "cosmic_var", action = ArgAction::Set,
          value_parser = parse_bool, num_args = 0..=1, default_missing_value = "true")]
    cosmic_variance: Option<bool>,

    /// Run and time a single iteration
    #[arg(long, action = ArgAction::Set, value_parser = parse_bool, num_args = 0..=1,
          default_missing_value = "true")]
    profile: Option<bool>,

    /// Relative CG tolerance
    #[arg(long, visible_alias = "tolerance")]
    tol: Option<f64>,

    /// CG iteration cap
    #[arg(long)]
    maxiter: Option<usize>,

    /// Band-limit
    #[arg(long)]
    lmax: Option<usize>,

    /// HEALPix resolution
    #[arg(long)]
    nside: Option<usize>,

    /// Observing frequencies in MHz, comma-separated
    #[arg(long, visible_alias = "freq")]
    frequency: Option<String>,

    /// Number of LST samples
    #[arg(long = "NLST")]
    nlst: Option<usize>,

    /// First LST in hours
    #[arg(long = "lst_start", allow_negative_numbers = true)]
    lst_start: Option<f64>,

    /// Last LST in hours
    #[arg(long = "lst_end", allow_negative_numbers = true)]
    lst_end: Option<f64>,

    /// Hexagonal array spacing in metres
    #[arg(long = "ant_distance", visible_alias = "ant_dist")]
    ant_distance: Option<f64>,

    /// Dish diameter in metres
    #[arg(long = "dish_diameter", visible_alias = "dish_dia")]
    dish_diameter: Option<f64>,

    /// Multiplier on the monopole prior and posterior
    #[arg(long = "front_factor")]
    front_factor: Option<f64>,

    /// Array latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    latitude: Option<f64>,

    /// Frequency at which a_lm are defined, in MHz
    #[arg(long = "reference_frequency")]
    reference_frequency: Option<f64>,

    /// Sky spectral index
    #[arg(long = "spectral_index", allow_negative_numbers = true)]
    spectral_index: Option<f64>,

    /// Worker threads (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Persist every k-th iteration
    #[arg(long)]
    thin: Option<usize>,

    /// Jacobi passes in map-to-alm analysis
    #[arg(long = "sht_iterations")]
    sht_iterations: Option<usize>,

    /// Hold C_0 at its prior value
    #[arg(long = "fix_monopole", action = ArgAction::Set, value_parser = parse_bool,
          num_args = 0..=1, default_missing_value = "true")]
    fix_monopole: Option<bool>,

    /// Prior mean
    #[arg(long = "prior_mean", value_enum)]
    prior_mean: Option<PriorMeanArg>,

    /// Abort the chain when a solve does not converge
    #[arg(long = "abort_on_nonconvergence", action = ArgAction::Set, value_parser = parse_bool,
          num_args = 0..=1, default_missing_value = "true")]
    abort_on_nonconvergence: Option<bool>,

    /// Start from the Wiener filter
    #[arg(long = "wiener_warm_start", action = ArgAction::Set, value_parser = parse_bool,
          num_args = 0..=1, default_missing_value = "true")]
    wiener_warm_start: Option<bool>,

    /// Continue an existing chain file
    #[arg(long, action = ArgAction::Set, value_parser = parse_bool, num_args = 0..=1,
          default_missing_value = "true")]
    resume: Option<bool>,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log every iteration
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PriorMeanArg {
    Zero,
    Perturbed,
}

impl Args {
    fn into_config(self) -> Result<Config, String> {
        let mut config = Config::default();
        macro_rules! apply {
            ($($arg:ident => $field:ident),* $(,)?) => {
                $(if let Some(value) = self.$arg {
                    config.$field = value;
                })*
            };
        }
        apply!(
            directory => directory,
            data_seed => data_seed,
            prior_seed => prior_seed,
            jobid => jobid,
            number_of_samples => number_of_samples,
            cosmic_variance => cosmic_variance,
            profile => profile,
            tol => tol,
            maxiter => maxiter,
            lmax => lmax,
            nside => nside,
            nlst => n_lst,
            lst_start => lst_start,
            lst_end => lst_end,
            ant_distance => ant_distance,
            dish_diameter => dish_diameter,
            front_factor => front_factor,
            latitude => latitude,
            reference_frequency => reference_frequency,
            spectral_index => spectral_index,
            threads => threads,
            thin => thin,
            sht_iterations => sht_iterations,
            fix_monopole => fix_monopole,
            abort_on_nonconvergence => abort_on_nonconvergence,
            wiener_warm_start => wiener_warm_start,
            resume => resume,
        );
        if let Some(frequency) = self.frequency {
            config.frequencies_mhz = parse_frequencies(&frequency)?;
        }
        if let Some(mean) = self.prior_mean {
            config.prior_mean = match mean {
                PriorMeanArg::Zero => PriorMean::Zero,
                PriorMeanArg::Perturbed => PriorMean::PerturbedTruth,
            };
        }
        Ok(config)
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);
    let quiet = args.quiet;

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let total = config.effective_samples();

    let runner = match ChainRunner::new(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let progress_bar = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total as u64)
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} iterations")
    {
        progress_bar.set_style(style.progress_chars("=>-"));
    }

    let bar = progress_bar.clone();
    let mut runner = runner.on_progress(move |done, _| bar.set_position(done as u64));

    match runner.run() {
        Ok(summary) => {
            progress_bar.finish_and_clear();
            println!("{}", format_summary(&summary));
            ExitCode::SUCCESS
        }
        Err(e) => {
            progress_bar.abandon();
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
