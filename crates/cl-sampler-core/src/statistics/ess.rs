//! Effective sample size of a Markov chain.

/// Largest lag included in the autocorrelation sum.
const MAX_LAG: usize = 50;

/// The sum stops at the first lag whose autocorrelation falls below this.
const RHO_CUTOFF: f64 = 0.05;

/// Effective sample size accounting for autocorrelation.
///
/// ```text
/// ESS = N / (1 + 2 Σ_k ρ_k)
/// ```
///
/// The sum runs over k = 1..=min(50, N/2) and stops at the first ρ_k < 0.05.
/// A chain without variance is treated as independent.
pub fn effective_sample_size(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n < 2 {
        return n as f64;
    }

    let mean = chain.iter().sum::<f64>() / n as f64;
    let var = chain.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if var <= f64::MIN_POSITIVE {
        return n as f64;
    }

    let mut sum_rho = 0.0;
    for k in 1..=MAX_LAG.min(n / 2) {
        let rho = autocorrelation(chain, k, mean, var);
        if rho < RHO_CUTOFF {
            break;
        }
        sum_rho += rho;
    }

    n as f64 / (1.0 + 2.0 * sum_rho)
}

/// Lag-k autocorrelation given the chain mean and (biased) variance.
pub fn autocorrelation(chain: &[f64], k: usize, mean: f64, var: f64) -> f64 {
    let n = chain.len();
    if k >= n || var <= 0.0 {
        return 0.0;
    }
    let cov = (0..n - k)
        .map(|i| (chain[i] - mean) * (chain[i + k] - mean))
        .sum::<f64>()
        / (n - k) as f64;
    cov / var
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_independent_chain_keeps_most_samples() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let chain: Vec<f64> = (0..2000).map(|_| StandardNormal.sample(&mut rng)).collect();
        let ess = effective_sample_size(&chain);
        assert!(ess > 1500.0, "ess = {ess}");
        assert!(ess <= 2000.0);
    }

    #[test]
    fn test_correlated_chain_loses_samples() {
        // AR(1) with φ = 0.9: ESS ≈ N (1 − φ) / (1 + φ) ≈ N / 19.
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mut x = 0.0;
        let chain: Vec<f64> = (0..5000)
            .map(|_| {
                let z: f64 = StandardNormal.sample(&mut rng);
                x = 0.9 * x + z;
                x
            })
            .collect();
        let ess = effective_sample_size(&chain);
        assert!(ess < 1000.0, "ess = {ess}");
        assert!(ess > 100.0, "ess = {ess}");
    }

    #[test]
    fn test_degenerate_chains() {
        assert_eq!(effective_sample_size(&[]), 0.0);
        assert_eq!(effective_sample_size(&[1.0]), 1.0);
        assert_eq!(effective_sample_size(&[3.0; 10]), 10.0);
    }

    #[test]
    fn test_lag_beyond_chain() {
        assert_eq!(autocorrelation(&[1.0, 2.0], 5, 1.5, 0.25), 0.0);
    }
}
