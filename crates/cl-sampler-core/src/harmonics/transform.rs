//! Ring-based spherical-harmonic transforms.
//!
//! Synthesis evaluates
//!
//! ```text
//! f(θ, φ) = Σ_ℓ a_ℓ0 λ_ℓ0(θ) + 2 Σ_{m≥1} Σ_ℓ λ_ℓm(θ) [Re a_ℓm cos mφ − Im a_ℓm sin mφ]
//! ```
//!
//! ring by ring: a Legendre sum per m gives one complex Fourier coefficient per
//! ring, and the pixels are the real part of its azimuthal series. The adjoint
//! and the quadrature analysis share the reverse path, a per-ring projection
//! Z_m = Σ_j g_j e^{−imφ_j} followed by a Legendre accumulation.
//!
//! λ_ℓm are the orthonormal associated Legendre functions (Condon–Shortley
//! phase), precomputed per ring with the standard three-term recurrence.

use num_complex::Complex64;

use super::healpix::{HealpixGeometry, Ring};
use super::index::AlmIndex;
use crate::error::ModelError;
use crate::parallel::map_indexed;
use crate::types::Vector;

/// Default number of Jacobi refinement passes in [`SphericalTransform::analyze`].
pub const DEFAULT_ANALYSIS_ITERATIONS: usize = 3;

/// Transform between realified a_ℓm vectors and pixel maps.
///
/// `synthesize` is linear, and `synthesize_adjoint` is its exact transpose
/// (no quadrature weights). `analyze` is an approximate inverse of
/// `synthesize` for band-limited maps.
pub trait SphericalTransform: Send + Sync {
    /// Index layout of the coefficient vectors.
    fn alm_index(&self) -> AlmIndex;

    /// Number of map pixels.
    fn n_pixels(&self) -> usize;

    /// Coefficients to map.
    fn synthesize(&self, alm: &Vector) -> Vector;

    /// Transpose of [`synthesize`](Self::synthesize).
    fn synthesize_adjoint(&self, map: &Vector) -> Vector;

    /// Map to coefficients.
    fn analyze(&self, map: &Vector) -> Vector;
}

/// Spherical-harmonic transform on a HEALPix RING grid.
#[derive(Debug, Clone)]
pub struct HealpixTransform {
    geometry: HealpixGeometry,
    index: AlmIndex,
    /// λ_ℓm per ring, ring-major, laid out like the real half of the alm vector.
    legendre: Vec<f64>,
    iterations: usize,
}

impl HealpixTransform {
    /// Build a transform for resolution `nside` and band-limit `lmax`.
    ///
    /// Fails if `lmax > 3·nside − 1`, where the ring grid aliases.
    pub fn new(nside: usize, lmax: usize) -> Result<Self, ModelError> {
        let geometry = HealpixGeometry::new(nside)?;
        if lmax > geometry.max_lmax() {
            return Err(ModelError::UnresolvedBandLimit {
                lmax,
                nside,
                max: geometry.max_lmax(),
            });
        }

        let index = AlmIndex::new(lmax);
        let n_real = index.n_real();
        let tables = map_indexed(geometry.rings().len(), |r| {
            let ring = &geometry.rings()[r];
            let mut table = vec![0.0; n_real];
            normalized_legendre(&index, ring.z, ring.sin_theta, &mut table);
            table
        });

        Ok(Self {
            geometry,
            index,
            legendre: tables.concat(),
            iterations: DEFAULT_ANALYSIS_ITERATIONS,
        })
    }

    /// Set the number of Jacobi refinement passes used by `analyze`.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Pixel geometry.
    pub fn geometry(&self) -> &HealpixGeometry {
        &self.geometry
    }

    /// Number of Jacobi refinement passes used by `analyze`.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn ring_legendre(&self, r: usize) -> &[f64] {
        let n = self.index.n_real();
        &self.legendre[r * n..(r + 1) * n]
    }

    /// Fourier coefficients F_m + i G_m of one ring for m = 0..=lmax.
    fn ring_coefficients(&self, alm: &Vector, r: usize) -> Vec<Complex64> {
        let lambda = self.ring_legendre(r);
        let lmax = self.index.lmax();
        (0..=lmax)
            .map(|m| {
                let mut acc = Complex64::new(0.0, 0.0);
                for ell in m..=lmax {
                    let re = self.index.re(ell, m);
                    let im = if m > 0 { alm[self.index.im(ell, m)] } else { 0.0 };
                    acc += lambda[re] * Complex64::new(alm[re], im);
                }
                acc
            })
            .collect()
    }

    fn synthesize_ring(&self, alm: &Vector, ring: &Ring, r: usize) -> Vec<f64> {
        let coeffs = self.ring_coefficients(alm, r);
        (0..ring.n_pix)
            .map(|j| {
                let step = Complex64::from_polar(1.0, ring.phi(j));
                let mut phase = Complex64::new(1.0, 0.0);
                let mut value = coeffs[0].re;
                for c in &coeffs[1..] {
                    phase *= step;
                    value += 2.0 * (c * phase).re;
                }
                value
            })
            .collect()
    }

    /// Z_m = Σ_j g_j e^{−imφ_j} over one ring.
    fn project_ring(&self, map: &Vector, ring: &Ring) -> Vec<Complex64> {
        let lmax = self.index.lmax();
        let mut z = vec![Complex64::new(0.0, 0.0); lmax + 1];
        for j in 0..ring.n_pix {
            let g = map[ring.first_pixel + j];
            let step = Complex64::from_polar(1.0, -ring.phi(j));
            let mut phase = Complex64::new(g, 0.0);
            z[0] += phase;
            for zm in &mut z[1..] {
                phase *= step;
                *zm += phase;
            }
        }
        z
    }

    /// Accumulate ring projections into coefficient space.
    ///
    /// `weight_m0` scales m = 0 terms and `weight_m` all others.
    fn accumulate(&self, map: &Vector, weight_m0: f64, weight_m: f64) -> Vector {
        let rings = self.geometry.rings();
        let projections = map_indexed(rings.len(), |r| self.project_ring(map, &rings[r]));

        let lmax = self.index.lmax();
        let mut out = Vector::zeros(self.index.len());
        for (r, z) in projections.iter().enumerate() {
            let lambda = self.ring_legendre(r);
            for (m, zm) in z.iter().enumerate() {
                let w = if m == 0 { weight_m0 } else { weight_m };
                for ell in m..=lmax {
                    let re = self.index.re(ell, m);
                    let scale = w * lambda[re];
                    out[re] += scale * zm.re;
                    if m > 0 {
                        out[self.index.im(ell, m)] += scale * zm.im;
                    }
                }
            }
        }
        out
    }

    fn quadrature(&self, map: &Vector) -> Vector {
        let w = self.geometry.pixel_area();
        self.accumulate(map, w, w)
    }
}

impl SphericalTransform for HealpixTransform {
    fn alm_index(&self) -> AlmIndex {
        self.index
    }

    fn n_pixels(&self) -> usize {
        self.geometry.n_pixels()
    }

    fn synthesize(&self, alm: &Vector) -> Vector {
        debug_assert_eq!(alm.len(), self.index.len());
        let rings = self.geometry.rings();
        let pieces = map_indexed(rings.len(), |r| self.synthesize_ring(alm, &rings[r], r));
        Vector::from_vec(pieces.concat())
    }

    fn synthesize_adjoint(&self, map: &Vector) -> Vector {
        debug_assert_eq!(map.len(), self.n_pixels());
        self.accumulate(map, 1.0, 2.0)
    }

    fn analyze(&self, map: &Vector) -> Vector {
        debug_assert_eq!(map.len(), self.n_pixels());
        let mut alm = self.quadrature(map);
        for _ in 0..self.iterations {
            let residual = map - self.synthesize(&alm);
            alm += self.quadrature(&residual);
        }
        alm
    }
}

/// Fill `out` (real-half alm layout) with λ_ℓm(cos θ = x) for all ℓ, m ≥ 0.
pub fn normalized_legendre(index: &AlmIndex, x: f64, sin_theta: f64, out: &mut [f64]) {
    let lmax = index.lmax();
    let mut lambda_mm = (0.25 * core::f64::consts::FRAC_1_PI).sqrt();

    for m in 0..=lmax {
        if m > 0 {
            let fm = m as f64;
            lambda_mm *= -((2.0 * fm + 1.0) / (2.0 * fm)).sqrt() * sin_theta;
        }
        out[index.re(m, m)] = lambda_mm;
        if m == lmax {
            break;
        }

        let fm = m as f64;
        out[index.re(m + 1, m)] = x * (2.0 * fm + 3.0).sqrt() * lambda_mm;

        for ell in (m + 2)..=lmax {
            let fl = ell as f64;
            let a = ((4.0 * fl * fl - 1.0) / (fl * fl - fm * fm)).sqrt();
            let prev = fl - 1.0;
            let b = ((prev * prev - fm * fm) / (4.0 * prev * prev - 1.0)).sqrt();
            out[index.re(ell, m)] =
                a * (x * out[index.re(ell - 1, m)] - b * out[index.re(ell - 2, m)]);
        }
    }
}
