//! Realified a_ℓm indexing.
//!
//! A real sky satisfies a_ℓ,−m = (−1)^m conj(a_ℓm), so only m ≥ 0 needs to be
//! stored. The (ℓ_max+1)² real degrees of freedom are packed as
//!
//! ```text
//! [ Re a_ℓm, m = 0..=ℓ_max, ℓ = m..=ℓ_max | Im a_ℓm, m = 1..=ℓ_max, ℓ = m..=ℓ_max ]
//! ```
//!
//! Both halves are m-major, so every fixed-m block is contiguous.

use serde::{Deserialize, Serialize};

/// Real or imaginary half of a complex coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Part {
    /// Real part (all m ≥ 0).
    Re,
    /// Imaginary part (m ≥ 1 only).
    Im,
}

/// Position of one real component in the realified vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    /// Multipole.
    pub ell: usize,
    /// Azimuthal order, m ≥ 0.
    pub m: usize,
    /// Which half of the complex coefficient.
    pub part: Part,
}

/// Index arithmetic for a realified a_ℓm vector with band-limit `lmax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlmIndex {
    lmax: usize,
}

impl AlmIndex {
    /// Index for band-limit `lmax`.
    pub fn new(lmax: usize) -> Self {
        Self { lmax }
    }

    /// Band-limit.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Number of multipoles, ℓ_max + 1.
    pub fn n_ell(&self) -> usize {
        self.lmax + 1
    }

    /// Total vector length, (ℓ_max+1)².
    pub fn len(&self) -> usize {
        self.n_ell() * self.n_ell()
    }

    /// Always false; a band-limit of zero still stores the monopole.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of real-part entries, (ℓ_max+1)(ℓ_max+2)/2.
    pub fn n_real(&self) -> usize {
        self.n_ell() * (self.lmax + 2) / 2
    }

    /// Offset of the first real-part entry with azimuthal order `m`.
    #[inline]
    pub fn m_offset(&self, m: usize) -> usize {
        m * (2 * self.lmax + 3 - m) / 2
    }

    /// Index of Re a_ℓm.
    #[inline]
    pub fn re(&self, ell: usize, m: usize) -> usize {
        debug_assert!(m <= ell && ell <= self.lmax);
        self.m_offset(m) + (ell - m)
    }

    /// Index of Im a_ℓm; requires m ≥ 1.
    #[inline]
    pub fn im(&self, ell: usize, m: usize) -> usize {
        debug_assert!(m >= 1, "Im a_l0 is identically zero and not stored");
        self.n_real() + self.re(ell, m) - self.n_ell()
    }

    /// Locate component `index` in (ℓ, m, part) terms.
    pub fn mode(&self, index: usize) -> Mode {
        debug_assert!(index < self.len());
        let (flat, part) = if index < self.n_real() {
            (index, Part::Re)
        } else {
            (index - self.n_real() + self.n_ell(), Part::Im)
        };
        let mut m = 0;
        while m < self.lmax && self.m_offset(m + 1) <= flat {
            m += 1;
        }
        Mode {
            ell: m + flat - self.m_offset(m),
            m,
            part,
        }
    }

    /// Multipole of every component, in vector order.
    pub fn ells(&self) -> Vec<usize> {
        (0..self.len()).map(|i| self.mode(i).ell).collect()
    }

    /// Whether component `index` is a real part with m = 0.
    pub fn is_axisymmetric(&self, index: usize) -> bool {
        index < self.n_ell()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        let idx = AlmIndex::new(3);
        assert_eq!(idx.len(), 16);
        assert_eq!(idx.n_real(), 10);
        assert_eq!(AlmIndex::new(0).len(), 1);
    }

    #[test]
    fn test_known_positions() {
        let idx = AlmIndex::new(2);
        // Re: (0,0) (1,0) (2,0) (1,1) (2,1) (2,2); Im: (1,1) (2,1) (2,2)
        assert_eq!(idx.re(0, 0), 0);
        assert_eq!(idx.re(2, 0), 2);
        assert_eq!(idx.re(1, 1), 3);
        assert_eq!(idx.re(2, 2), 5);
        assert_eq!(idx.im(1, 1), 6);
        assert_eq!(idx.im(2, 2), 8);
    }

    #[test]
    fn test_every_index_visited_once() {
        let idx = AlmIndex::new(7);
        let mut seen = vec![false; idx.len()];
        for ell in 0..=7 {
            for m in 0..=ell {
                let r = idx.re(ell, m);
                assert!(!seen[r]);
                seen[r] = true;
                if m > 0 {
                    let i = idx.im(ell, m);
                    assert!(!seen[i]);
                    seen[i] = true;
                }
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn test_modes_per_ell() {
        let idx = AlmIndex::new(5);
        let ells = idx.ells();
        for ell in 0..=5 {
            let count = ells.iter().filter(|&&l| l == ell).count();
            assert_eq!(count, 2 * ell + 1, "ell = {ell}");
        }
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Every stored component maps back to the (ℓ, m, part) it was built from
        #[test]
        fn prop_mode_inverts_index(lmax in 0usize..40, a in 0usize..40, b in 0usize..40) {
            let ell = a.min(lmax);
            let m = b.min(ell);
            let idx = AlmIndex::new(lmax);
            let mode = idx.mode(idx.re(ell, m));
            prop_assert_eq!((mode.ell, mode.m, mode.part), (ell, m, Part::Re));
            if m > 0 {
                let mode = idx.mode(idx.im(ell, m));
                prop_assert_eq!((mode.ell, mode.m, mode.part), (ell, m, Part::Im));
            }
        }
    }
}
