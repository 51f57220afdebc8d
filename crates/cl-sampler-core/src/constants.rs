//! Physical and numerical constants used throughout the crate.

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Airy-disc matching factor for the Gaussian beam width.
///
/// A dish of diameter D has its first Airy null near 1.22 λ/D; the Gaussian
/// whose FWHM matches the Airy FWHM has FWHM = arcsin(2.2150894 λ / (π D)) · 2.
pub const AIRY_FWHM_FACTOR: f64 = 2.215_089_4;

/// Ratio between Gaussian FWHM and standard deviation (2√(2 ln 2)).
pub const FWHM_TO_SIGMA: f64 = 2.355;

/// Beam power below which a pixel is dropped from the pointing cache.
pub const BEAM_CUTOFF: f64 = 1e-8;

/// Integration time per LST sample (seconds).
pub const INTEGRATION_TIME_S: f64 = 60.0;

/// Channel width (Hz).
pub const CHANNEL_WIDTH_HZ: f64 = 1.0e6;

/// Number of nights averaged into each visibility.
pub const N_NIGHTS: f64 = 1.0;

/// Lower bound on per-component noise variance.
pub const NOISE_VARIANCE_FLOOR: f64 = 1e-12;

/// Lower bound on a sampled C_ℓ.
pub const CL_FLOOR: f64 = 1e-12;

/// Lower bound on a prior component variance (prior standard deviation 0.5).
pub const MIN_PRIOR_VARIANCE: f64 = 0.25;

/// Fractional cosmic-variance inflation scale: C_ℓ · f · √(2/(2ℓ+1)).
pub const COSMIC_VARIANCE_FRACTION: f64 = 0.1;

/// Mean sky brightness temperature at the reference frequency (K).
pub const MONOPOLE_TEMPERATURE_K: f64 = 1000.0;

/// Reference spectrum amplitude at the pivot multipole (K²).
pub const REFERENCE_AMPLITUDE: f64 = 2000.0;

/// Reference spectrum pivot multipole.
pub const REFERENCE_PIVOT: f64 = 10.0;

/// Reference spectrum slope in ℓ.
pub const REFERENCE_SLOPE: f64 = -2.4;

/// HERA site latitude (degrees).
pub const HERA_LATITUDE_DEG: f64 = -30.7215;

/// Antennas per row of the hexagonal array.
pub const HEX_ROWS: [usize; 3] = [3, 4, 3];
