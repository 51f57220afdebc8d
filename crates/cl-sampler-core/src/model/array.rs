//! Antenna layout and baselines.

use serde::{Deserialize, Serialize};

use crate::constants::HEX_ROWS;
use crate::error::ModelError;

/// Antenna position in the local east-north-up frame (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Antenna {
    /// Antenna number.
    pub id: usize,
    /// East, north, up (m).
    pub enu: [f64; 3],
}

/// Cross-correlation between two antennas, `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// First antenna.
    pub i: usize,
    /// Second antenna.
    pub j: usize,
    /// Separation r_j − r_i in east-north-up (m).
    pub enu: [f64; 3],
}

/// A set of co-planar antennas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaArray {
    antennas: Vec<Antenna>,
}

impl AntennaArray {
    /// Compact hexagon with rows of 3, 4 and 3 antennas spaced `spacing` apart.
    ///
    /// Rows run east-west, are separated by spacing·√3/2 in north, and are
    /// centred on the array origin.
    pub fn hexagonal(spacing: f64) -> Result<Self, ModelError> {
        ModelError::require_positive("ant_distance", spacing)?;

        let row_step = spacing * 3f64.sqrt() / 2.0;
        let centre_row = (HEX_ROWS.len() - 1) as f64 / 2.0;
        let mut antennas = Vec::with_capacity(HEX_ROWS.iter().sum());

        for (row, &count) in HEX_ROWS.iter().enumerate() {
            let north = (centre_row - row as f64) * row_step;
            let half_width = (count - 1) as f64 / 2.0;
            for k in 0..count {
                antennas.push(Antenna {
                    id: antennas.len(),
                    enu: [(k as f64 - half_width) * spacing, north, 0.0],
                });
            }
        }

        Ok(Self { antennas })
    }

    /// Antennas in id order.
    pub fn antennas(&self) -> &[Antenna] {
        &self.antennas
    }

    /// Number of antennas.
    pub fn len(&self) -> usize {
        self.antennas.len()
    }

    /// True if the array has no antennas.
    pub fn is_empty(&self) -> bool {
        self.antennas.is_empty()
    }

    /// All cross-correlation baselines with `i < j`, in lexicographic order.
    pub fn baselines(&self) -> Vec<Baseline> {
        let mut out = Vec::with_capacity(self.len() * self.len().saturating_sub(1) / 2);
        for (a, first) in self.antennas.iter().enumerate() {
            for second in &self.antennas[a + 1..] {
                out.push(Baseline {
                    i: first.id,
                    j: second.id,
                    enu: [
                        second.enu[0] - first.enu[0],
                        second.enu[1] - first.enu[1],
                        second.enu[2] - first.enu[2],
                    ],
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_array_has_ten_antennas_and_45_baselines() {
        let array = AntennaArray::hexagonal(14.6).unwrap();
        assert_eq!(array.len(), 10);
        assert_eq!(array.baselines().len(), 45);
    }

    #[test]
    fn test_nearest_neighbours_are_one_spacing_apart() {
        let spacing = 14.6;
        let array = AntennaArray::hexagonal(spacing).unwrap();
        let shortest = array
            .baselines()
            .iter()
            .map(|b| (b.enu[0].powi(2) + b.enu[1].powi(2)).sqrt())
            .fold(f64::INFINITY, f64::min);
        assert!((shortest - spacing).abs() < 1e-9);
    }

    #[test]
    fn test_hex_array_is_centred() {
        let array = AntennaArray::hexagonal(10.0).unwrap();
        let (e, n) = array
            .antennas()
            .iter()
            .fold((0.0, 0.0), |(e, n), a| (e + a.enu[0], n + a.enu[1]));
        assert!(e.abs() < 1e-9 && n.abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_spacing() {
        assert!(AntennaArray::hexagonal(-1.0).is_err());
        assert!(AntennaArray::hexagonal(f64::NAN).is_err());
    }
}
