//! Drift-scan observation model.
//!
//! A fixed array at latitude `lat` observes the sky as it rotates overhead.
//! For frequency ν, LST t and baseline b the model visibility is
//!
//! ```text
//! V_b(ν, t) = Ω_pix Σ_p B_ν(za_p(t)) (ν/ν_ref)^β T_p exp(−2πi ν b·ŝ_p(t) / c)
//! ```
//!
//! with T = synthesize(a). Complex visibilities are stored as consecutive
//! (Re, Im) pairs; visibility `v = (f·N_lst + t)·N_bl + b`.
//!
//! Per-pointing pixel lists (pixels above the horizon with non-negligible beam
//! power) are computed once. The response is never materialized as a matrix.

use core::f64::consts::PI;

use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::array::{AntennaArray, Baseline};
use super::beam::{GaussianBeam, PrimaryBeam};
use super::sky::GroundTruth;
use crate::analysis::LinearOperator;
use crate::constants::{
    BEAM_CUTOFF, CHANNEL_WIDTH_HZ, HERA_LATITUDE_DEG, INTEGRATION_TIME_S, NOISE_VARIANCE_FLOOR,
    N_NIGHTS, SPEED_OF_LIGHT,
};
use crate::error::ModelError;
use crate::harmonics::{HealpixTransform, SphericalTransform, DEFAULT_ANALYSIS_ITERATIONS};
use crate::parallel::map_indexed;
use crate::seeds::{SeedStream, Stream};
use crate::types::Vector;

/// Instrument and observing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpec {
    /// Band-limit of the sky model.
    pub lmax: usize,
    /// HEALPix resolution of the simulation grid.
    pub nside: usize,
    /// Observing frequencies (MHz).
    pub frequencies_mhz: Vec<f64>,
    /// Frequency at which the sky coefficients are defined (MHz).
    pub reference_frequency_mhz: f64,
    /// Spectral index β of the sky brightness.
    pub spectral_index: f64,
    /// Number of LST samples.
    pub n_lst: usize,
    /// First LST (hours).
    pub lst_start_hours: f64,
    /// Last LST (hours), inclusive.
    pub lst_end_hours: f64,
    /// Array latitude (degrees).
    pub latitude_deg: f64,
    /// Hexagonal array spacing (m).
    pub ant_distance: f64,
    /// Dish diameter (m).
    pub dish_diameter: f64,
    /// Jacobi passes in map-to-alm analysis.
    pub sht_iterations: usize,
}

impl Default for ObservationSpec {
    fn default() -> Self {
        Self {
            lmax: 20,
            nside: 128,
            frequencies_mhz: vec![100.0],
            reference_frequency_mhz: 100.0,
            spectral_index: -2.55,
            n_lst: 10,
            lst_start_hours: 0.0,
            lst_end_hours: 8.0,
            latitude_deg: HERA_LATITUDE_DEG,
            ant_distance: 14.6,
            dish_diameter: 14.0,
            sht_iterations: DEFAULT_ANALYSIS_ITERATIONS,
        }
    }
}

impl ObservationSpec {
    /// Check that the parameters describe a realizable observation.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_lst == 0 {
            return Err(ModelError::EmptyLstGrid);
        }
        if self.lst_start_hours.is_nan()
            || self.lst_end_hours.is_nan()
            || self.lst_end_hours <= self.lst_start_hours
        {
            return Err(ModelError::InvalidLstRange {
                start: self.lst_start_hours,
                end: self.lst_end_hours,
            });
        }
        if self.nside == 0 {
            return Err(ModelError::InvalidParameter {
                name: "nside",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        if self.lmax > 3 * self.nside - 1 {
            return Err(ModelError::UnresolvedBandLimit {
                lmax: self.lmax,
                nside: self.nside,
                max: 3 * self.nside - 1,
            });
        }
        if self.frequencies_mhz.is_empty() {
            return Err(ModelError::InvalidParameter {
                name: "frequency",
                value: 0.0,
                reason: "at least one frequency is required",
            });
        }
        for &f in &self.frequencies_mhz {
            ModelError::require_positive("frequency", f)?;
        }
        ModelError::require_positive("reference_frequency", self.reference_frequency_mhz)?;
        ModelError::require_positive("ant_distance", self.ant_distance)?;
        ModelError::require_positive("dish_diameter", self.dish_diameter)?;
        if !self.spectral_index.is_finite() {
            return Err(ModelError::InvalidParameter {
                name: "spectral_index",
                value: self.spectral_index,
                reason: "must be finite",
            });
        }
        if !(-90.0..=90.0).contains(&self.latitude_deg) {
            return Err(ModelError::InvalidParameter {
                name: "latitude",
                value: self.latitude_deg,
                reason: "must lie in [-90, 90] degrees",
            });
        }
        Ok(())
    }

    /// LST grid in hours, linearly spaced and inclusive of both ends.
    pub fn lst_hours(&self) -> Vec<f64> {
        if self.n_lst == 1 {
            return vec![self.lst_start_hours];
        }
        let step = (self.lst_end_hours - self.lst_start_hours) / (self.n_lst - 1) as f64;
        (0..self.n_lst)
            .map(|k| self.lst_start_hours + step * k as f64)
            .collect()
    }
}

/// Pixels seen by the array at one (frequency, LST).
#[derive(Debug, Clone)]
struct Pointing {
    freq_hz: f64,
    pixels: Vec<usize>,
    /// Ω_pix · B(za) · (ν/ν_ref)^β per pixel.
    weights: Vec<f64>,
    /// Topocentric unit vector (east, north, up) per pixel.
    directions: Vec<[f64; 3]>,
}

impl Pointing {
    /// Σ_p w_p T_p e^{−iφ_bp} for one baseline, as (Re, Im).
    fn visibility(&self, map: &Vector, baseline: &Baseline) -> (f64, f64) {
        let k = 2.0 * PI * self.freq_hz / SPEED_OF_LIGHT;
        let (mut re, mut im) = (0.0, 0.0);
        for ((&p, &w), d) in self.pixels.iter().zip(&self.weights).zip(&self.directions) {
            let phase = k * dot(&baseline.enu, d);
            let (s, c) = phase.sin_cos();
            let wt = w * map[p];
            re += wt * c;
            im -= wt * s;
        }
        (re, im)
    }

    fn autocorrelation(&self, map: &Vector) -> f64 {
        self.pixels
            .iter()
            .zip(&self.weights)
            .map(|(&p, &w)| w * map[p])
            .sum()
    }
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Topocentric (east, north, up) unit vector of equatorial direction (ra, dec)
/// at local sidereal time `lst` and latitude `lat` (all radians).
pub fn topocentric_direction(ra: f64, dec: f64, lst: f64, lat: f64) -> [f64; 3] {
    let hour_angle = lst - ra;
    let (sin_h, cos_h) = hour_angle.sin_cos();
    let (sin_d, cos_d) = dec.sin_cos();
    let (sin_l, cos_l) = lat.sin_cos();
    [
        -cos_d * sin_h,
        sin_d * cos_l - cos_d * cos_h * sin_l,
        sin_d * sin_l + cos_d * cos_h * cos_l,
    ]
}

/// Linear map from realified a_ℓm to real-packed visibilities.
#[derive(Debug, Clone)]
pub struct DriftScanResponse {
    transform: HealpixTransform,
    baselines: Vec<Baseline>,
    pointings: Vec<Pointing>,
    n_freq: usize,
    n_lst: usize,
}

impl DriftScanResponse {
    /// Precompute pointing caches for `spec`.
    pub fn new<B: PrimaryBeam>(
        spec: &ObservationSpec,
        array: &AntennaArray,
        beam: &B,
    ) -> Result<Self, ModelError> {
        spec.validate()?;
        let transform =
            HealpixTransform::new(spec.nside, spec.lmax)?.with_iterations(spec.sht_iterations);
        let geometry = transform.geometry();
        let omega = geometry.pixel_area();
        let angles = geometry.pixel_angles();
        let latitude = spec.latitude_deg.to_radians();
        let lsts: Vec<f64> = spec
            .lst_hours()
            .iter()
            .map(|h| (h / 24.0) * 2.0 * PI)
            .collect();

        let n_freq = spec.frequencies_mhz.len();
        let n_lst = lsts.len();
        let pointings = map_indexed(n_freq * n_lst, |k| {
            let (f, t) = (k / n_lst, k % n_lst);
            let freq_hz = spec.frequencies_mhz[f] * 1e6;
            let scale =
                (spec.frequencies_mhz[f] / spec.reference_frequency_mhz).powf(spec.spectral_index);

            let mut pixels = Vec::new();
            let mut weights = Vec::new();
            let mut directions = Vec::new();
            for (p, &(theta, phi)) in angles.iter().enumerate() {
                let dir = topocentric_direction(phi, 0.5 * PI - theta, lsts[t], latitude);
                if dir[2] <= 0.0 {
                    continue;
                }
                let power = beam.power(dir[2].clamp(-1.0, 1.0).acos(), freq_hz);
                if power < BEAM_CUTOFF {
                    continue;
                }
                pixels.push(p);
                weights.push(omega * power * scale);
                directions.push(dir);
            }
            Pointing {
                freq_hz,
                pixels,
                weights,
                directions,
            }
        });

        tracing::debug!(
            pointings = pointings.len(),
            mean_pixels = pointings.iter().map(|p| p.pixels.len()).sum::<usize>()
                / pointings.len().max(1),
            "built drift-scan pointing cache"
        );

        Ok(Self {
            transform,
            baselines: array.baselines(),
            pointings,
            n_freq,
            n_lst,
        })
    }

    /// Harmonic transform used by the response.
    pub fn transform(&self) -> &HealpixTransform {
        &self.transform
    }

    /// Baselines in visibility order.
    pub fn baselines(&self) -> &[Baseline] {
        &self.baselines
    }

    /// Number of complex visibilities, N_freq · N_lst · N_bl.
    pub fn n_visibilities(&self) -> usize {
        self.pointings.len() * self.baselines.len()
    }

    /// Number of frequencies.
    pub fn n_frequencies(&self) -> usize {
        self.n_freq
    }

    /// Number of LST samples.
    pub fn n_lst(&self) -> usize {
        self.n_lst
    }

    /// Auto-correlation Σ_p w_p T_p of a sky for each (frequency, LST).
    ///
    /// All antennas share one beam, so every antenna sees the same value.
    pub fn autocorrelations(&self, alm: &Vector) -> Vec<f64> {
        let map = self.transform.synthesize(alm);
        self.pointings
            .iter()
            .map(|p| p.autocorrelation(&map))
            .collect()
    }
}

impl LinearOperator for DriftScanResponse {
    fn nrows(&self) -> usize {
        2 * self.n_visibilities()
    }

    fn ncols(&self) -> usize {
        self.transform.alm_index().len()
    }

    fn apply(&self, alm: &Vector) -> Vector {
        let map = self.transform.synthesize(alm);
        let n_bl = self.baselines.len();
        let vis = map_indexed(self.n_visibilities(), |v| {
            self.pointings[v / n_bl].visibility(&map, &self.baselines[v % n_bl])
        });

        let mut out = Vector::zeros(self.nrows());
        for (v, (re, im)) in vis.into_iter().enumerate() {
            out[2 * v] = re;
            out[2 * v + 1] = im;
        }
        out
    }

    fn apply_adjoint(&self, y: &Vector) -> Vector {
        debug_assert_eq!(y.len(), self.nrows());
        let n_bl = self.baselines.len();
        let contributions = map_indexed(self.pointings.len(), |k| {
            let pointing = &self.pointings[k];
            let wavenumber = 2.0 * PI * pointing.freq_hz / SPEED_OF_LIGHT;
            let mut acc = vec![0.0; pointing.pixels.len()];
            for (b, baseline) in self.baselines.iter().enumerate() {
                let v = k * n_bl + b;
                let (y_re, y_im) = (y[2 * v], y[2 * v + 1]);
                for ((a, &w), d) in acc.iter_mut().zip(&pointing.weights).zip(&pointing.directions)
                {
                    let (s, c) = (wavenumber * dot(&baseline.enu, d)).sin_cos();
                    *a += w * (y_re * c - y_im * s);
                }
            }
            acc
        });

        let mut map = Vector::zeros(self.transform.n_pixels());
        for (pointing, acc) in self.pointings.iter().zip(contributions) {
            for (&p, a) in pointing.pixels.iter().zip(acc) {
                map[p] += a;
            }
        }
        self.transform.synthesize_adjoint(&map)
    }
}

/// Simulated data set: response, noisy visibilities and noise covariance.
#[derive(Debug, Clone)]
pub struct ObservationModel {
    spec: ObservationSpec,
    array: AntennaArray,
    response: DriftScanResponse,
    data: Vector,
    noise_variance: Vector,
    noise_floored: usize,
}

impl ObservationModel {
    /// Simulate observing `truth` with the hexagonal array and Gaussian beam.
    pub fn simulate(
        spec: &ObservationSpec,
        truth: &GroundTruth,
        seeds: &SeedStream,
    ) -> Result<Self, ModelError> {
        spec.validate()?;
        let array = AntennaArray::hexagonal(spec.ant_distance)?;
        let beam = GaussianBeam::new(spec.dish_diameter)?;
        let response = DriftScanResponse::new(spec, &array, &beam)?;
        if truth.alm.len() != response.ncols() {
            return Err(ModelError::DimensionMismatch {
                expected: response.ncols(),
                actual: truth.alm.len(),
            });
        }

        let model = response.apply(&truth.alm);
        let (noise_variance, noise_floored) = radiometer_variance(&response, &truth.alm);
        if noise_floored > 0 {
            tracing::warn!(
                floored = noise_floored,
                floor = NOISE_VARIANCE_FLOOR,
                "noise variance floored; auto-correlation power is near zero"
            );
        }

        let mut rng = seeds.rng(Stream::Noise, 0);
        let data = Vector::from_fn(model.len(), |i, _| {
            let z: f64 = StandardNormal.sample(&mut rng);
            model[i] + noise_variance[i].sqrt() * z
        });

        tracing::info!(
            visibilities = response.n_visibilities(),
            baselines = response.baselines().len(),
            frequencies = response.n_frequencies(),
            lsts = response.n_lst(),
            "simulated drift-scan data"
        );

        Ok(Self {
            spec: spec.clone(),
            array,
            response,
            data,
            noise_variance,
            noise_floored,
        })
    }

    /// Observing parameters.
    pub fn spec(&self) -> &ObservationSpec {
        &self.spec
    }

    /// Antenna array.
    pub fn array(&self) -> &AntennaArray {
        &self.array
    }

    /// Response operator R.
    pub fn response(&self) -> &DriftScanResponse {
        &self.response
    }

    /// Noisy data vector d = R a_true + n.
    pub fn data(&self) -> &Vector {
        &self.data
    }

    /// Diagonal noise covariance N, per real component.
    pub fn noise_variance(&self) -> &Vector {
        &self.noise_variance
    }

    /// Number of noise variances raised to the floor.
    pub fn noise_floored(&self) -> usize {
        self.noise_floored
    }
}

/// Radiometer-equation noise variance per real component.
///
/// σ² = ½ |V_ii| |V_jj| / (N_nights Δt Δν), with V_ii the auto-correlation of
/// antenna i. Returns the variances and how many were floored.
fn radiometer_variance(response: &DriftScanResponse, alm: &Vector) -> (Vector, usize) {
    let autos = response.autocorrelations(alm);
    let n_bl = response.baselines().len();
    let denominator = N_NIGHTS * INTEGRATION_TIME_S * CHANNEL_WIDTH_HZ;
    let mut floored = 0;
    let mut variance = Vector::zeros(response.nrows());
    for v in 0..response.n_visibilities() {
        let auto = autos[v / n_bl].abs();
        let mut sigma2 = 0.5 * auto * auto / denominator;
        if sigma2.is_nan() || sigma2 < NOISE_VARIANCE_FLOOR {
            sigma2 = NOISE_VARIANCE_FLOOR;
            floored += 1;
        }
        variance[2 * v] = sigma2;
        variance[2 * v + 1] = sigma2;
    }
    (variance, floored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmonics::AlmIndex;
    use crate::model::ReferenceSpectrum;

    fn small_spec() -> ObservationSpec {
        ObservationSpec {
            lmax: 4,
            nside: 8,
            n_lst: 4,
            ..ObservationSpec::default()
        }
    }

    #[test]
    fn test_lst_grid_is_inclusive() {
        let spec = small_spec();
        let lst = spec.lst_hours();
        assert_eq!(lst.len(), 4);
        assert_eq!(lst[0], 0.0);
        assert!((lst[3] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_lst() {
        let mut spec = small_spec();
        spec.n_lst = 0;
        assert_eq!(spec.validate(), Err(ModelError::EmptyLstGrid));

        let mut spec = small_spec();
        spec.lst_end_hours = spec.lst_start_hours;
        assert!(matches!(spec.validate(), Err(ModelError::InvalidLstRange { .. })));
    }

    #[test]
    fn test_validate_rejects_unresolved_lmax() {
        let spec = ObservationSpec {
            lmax: 30,
            nside: 8,
            ..small_spec()
        };
        assert!(matches!(
            spec.validate(),
            Err(ModelError::UnresolvedBandLimit { max: 23, .. })
        ));
    }

    #[test]
    fn test_zenith_direction() {
        // A source on the meridian at dec = latitude is overhead.
        let lat = -0.5;
        let d = topocentric_direction(1.0, lat, 1.0, lat);
        assert!(d[0].abs() < 1e-12 && d[1].abs() < 1e-12);
        assert!((d[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_response_dimensions() {
        let spec = small_spec();
        let array = AntennaArray::hexagonal(spec.ant_distance).unwrap();
        let beam = GaussianBeam::new(spec.dish_diameter).unwrap();
        let r = DriftScanResponse::new(&spec, &array, &beam).unwrap();
        assert_eq!(r.n_visibilities(), 45 * 4);
        assert_eq!(r.nrows(), 2 * 45 * 4);
        assert_eq!(r.ncols(), 25);
    }

    #[test]
    fn test_response_adjoint_identity() {
        use rand::SeedableRng;
        use rand_xoshiro::Xoshiro256PlusPlus;

        let spec = small_spec();
        let array = AntennaArray::hexagonal(spec.ant_distance).unwrap();
        let beam = GaussianBeam::new(spec.dish_diameter).unwrap();
        let r = DriftScanResponse::new(&spec, &array, &beam).unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let x = Vector::from_fn(r.ncols(), |_, _| StandardNormal.sample(&mut rng));
        let y = Vector::from_fn(r.nrows(), |_, _| StandardNormal.sample(&mut rng));
        let lhs = r.apply(&x).dot(&y);
        let rhs = x.dot(&r.apply_adjoint(&y));
        assert!((lhs - rhs).abs() < 1e-9 * lhs.abs().max(1.0), "{lhs} vs {rhs}");
    }

    #[test]
    fn test_simulated_noise_is_positive_and_seeded() {
        let spec = small_spec();
        let index = AlmIndex::new(spec.lmax);
        let seeds = SeedStream::new(10, 20, 0);
        let truth = GroundTruth::draw(index, &ReferenceSpectrum::default(), &seeds);

        let a = ObservationModel::simulate(&spec, &truth, &seeds).unwrap();
        let b = ObservationModel::simulate(&spec, &truth, &seeds).unwrap();
        assert_eq!(a.data(), b.data());
        assert!(a.noise_variance().iter().all(|&s| s > 0.0));

        let c = ObservationModel::simulate(&spec, &truth, &SeedStream::new(11, 20, 0)).unwrap();
        assert_ne!(a.data(), c.data());
    }

    #[test]
    fn test_frequency_scaling_of_autos() {
        let index = AlmIndex::new(2);
        let mut alm = Vector::zeros(index.len());
        alm[0] = 10.0;
        let array = AntennaArray::hexagonal(14.6).unwrap();
        // A beam broad enough to be effectively flat at both frequencies.
        let beam = GaussianBeam::new(0.5).unwrap();
        let spec = ObservationSpec {
            lmax: 2,
            nside: 4,
            n_lst: 2,
            frequencies_mhz: vec![100.0, 200.0],
            ..ObservationSpec::default()
        };
        let r = DriftScanResponse::new(&spec, &array, &beam).unwrap();
        let autos = r.autocorrelations(&alm);
        let ratio = autos[2] / autos[0];
        assert!((ratio - 2f64.powf(spec.spectral_index)).abs() < 1e-2, "ratio {ratio}");
    }
}
