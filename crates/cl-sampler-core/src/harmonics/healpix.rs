//! HEALPix RING-scheme geometry.
//!
//! The sphere is cut into 4·nside − 1 iso-latitude rings. Polar rings carry
//! 4i pixels, equatorial rings 4·nside; pixels are numbered ring by ring from
//! the north pole, eastward within a ring. All pixels have equal area
//! 4π / (12·nside²).

use core::f64::consts::PI;

use crate::error::ModelError;

/// One iso-latitude ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    /// cos θ of the ring.
    pub z: f64,
    /// sin θ of the ring, computed as √((1−z)(1+z)).
    pub sin_theta: f64,
    /// Number of pixels on the ring.
    pub n_pix: usize,
    /// Index of the first pixel on the ring.
    pub first_pixel: usize,
    /// Azimuth of the first pixel.
    pub phi0: f64,
}

impl Ring {
    /// Colatitude θ.
    pub fn theta(&self) -> f64 {
        self.z.clamp(-1.0, 1.0).acos()
    }

    /// Azimuth of pixel `j` on this ring.
    #[inline]
    pub fn phi(&self, j: usize) -> f64 {
        self.phi0 + 2.0 * PI * j as f64 / self.n_pix as f64
    }
}

/// Pixel layout of a HEALPix map in RING ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct HealpixGeometry {
    nside: usize,
    rings: Vec<Ring>,
}

impl HealpixGeometry {
    /// Build the ring table for `nside`.
    pub fn new(nside: usize) -> Result<Self, ModelError> {
        if nside == 0 {
            return Err(ModelError::InvalidParameter {
                name: "nside",
                value: 0.0,
                reason: "must be at least 1",
            });
        }

        let n = nside as f64;
        let n_pix_total = 12 * nside * nside;
        let n_cap = 2 * nside * (nside - 1);
        let mut rings = Vec::with_capacity(4 * nside - 1);

        for i in 1..4 * nside {
            let ring = if i < nside {
                let fi = i as f64;
                Ring {
                    z: 1.0 - fi * fi / (3.0 * n * n),
                    sin_theta: 0.0,
                    n_pix: 4 * i,
                    first_pixel: 2 * i * (i - 1),
                    phi0: PI / (4.0 * fi),
                }
            } else if i <= 3 * nside {
                let shifted = (i + nside) % 2 == 0;
                Ring {
                    z: 4.0 / 3.0 - 2.0 * i as f64 / (3.0 * n),
                    sin_theta: 0.0,
                    n_pix: 4 * nside,
                    first_pixel: n_cap + (i - nside) * 4 * nside,
                    phi0: if shifted { PI / (4.0 * n) } else { 0.0 },
                }
            } else {
                let mirror = 4 * nside - i;
                let fi = mirror as f64;
                Ring {
                    z: -(1.0 - fi * fi / (3.0 * n * n)),
                    sin_theta: 0.0,
                    n_pix: 4 * mirror,
                    first_pixel: n_pix_total - 2 * mirror * (mirror + 1),
                    phi0: PI / (4.0 * fi),
                }
            };
            rings.push(Ring {
                sin_theta: ((1.0 - ring.z) * (1.0 + ring.z)).max(0.0).sqrt(),
                ..ring
            });
        }

        Ok(Self { nside, rings })
    }

    /// Resolution parameter.
    pub fn nside(&self) -> usize {
        self.nside
    }

    /// Total number of pixels, 12·nside².
    pub fn n_pixels(&self) -> usize {
        12 * self.nside * self.nside
    }

    /// Solid angle of one pixel (sr).
    pub fn pixel_area(&self) -> f64 {
        4.0 * PI / self.n_pixels() as f64
    }

    /// Largest band-limit this resolution supports, 3·nside − 1.
    pub fn max_lmax(&self) -> usize {
        3 * self.nside - 1
    }

    /// Ring table, north to south.
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// (θ, φ) of every pixel in RING order.
    pub fn pixel_angles(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(self.n_pixels());
        for ring in &self.rings {
            let theta = ring.theta();
            out.extend((0..ring.n_pix).map(|j| (theta, ring.phi(j))));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_count_and_contiguity() {
        for nside in [1, 2, 4, 8, 16] {
            let geom = HealpixGeometry::new(nside).unwrap();
            let mut next = 0;
            for ring in geom.rings() {
                assert_eq!(ring.first_pixel, next, "nside {nside}");
                next += ring.n_pix;
            }
            assert_eq!(next, geom.n_pixels());
            assert_eq!(geom.rings().len(), 4 * nside - 1);
        }
    }

    #[test]
    fn test_rings_are_symmetric() {
        let geom = HealpixGeometry::new(8).unwrap();
        let rings = geom.rings();
        let n = rings.len();
        for i in 0..n {
            let north = rings[i];
            let south = rings[n - 1 - i];
            assert!((north.z + south.z).abs() < 1e-14);
            assert_eq!(north.n_pix, south.n_pix);
        }
    }

    #[test]
    fn test_equal_area_quadrature_integrates_z_squared() {
        // ∫ cos²θ dΩ = 4π/3
        let geom = HealpixGeometry::new(16).unwrap();
        let sum: f64 = geom
            .rings()
            .iter()
            .map(|r| r.n_pix as f64 * r.z * r.z)
            .sum::<f64>()
            * geom.pixel_area();
        assert!((sum - 4.0 * PI / 3.0).abs() < 5e-3, "got {sum}");
    }

    #[test]
    fn test_rejects_zero_nside() {
        assert!(HealpixGeometry::new(0).is_err());
    }

    #[test]
    fn test_pixel_angles_length() {
        let geom = HealpixGeometry::new(4).unwrap();
        let angles = geom.pixel_angles();
        assert_eq!(angles.len(), 192);
        assert!(angles.iter().all(|&(t, p)| (0.0..=PI).contains(&t) && (0.0..2.0 * PI).contains(&p)));
    }
}
