//! Monte Carlo sampling of a category's risk distribution.
//!
//! Samples are drawn from a normal distribution and clamped into [0, 100]
//! (truncation by clamping, so mass piles up at the bounds rather than being
//! redistributed). Summary statistics use the population standard deviation
//! and linearly interpolated percentiles.

use std::collections::BTreeMap;

use chrono::Utc;
use common::config::SimulationConfig;
use common::{Category, Error, SimulationResult, PERCENTILE_RANKS};
use rand::Rng;
use rand_distr::{Distribution, Normal};

pub const MIN_ITERATIONS: usize = 100;
pub const MAX_ITERATIONS: usize = 100_000;

/// Center and spread of the sampling distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionParams {
    pub center: f64,
    pub spread: f64,
}

pub fn validate_iterations(iterations: usize) -> Result<(), Error> {
    if (MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        Ok(())
    } else {
        Err(Error::InvalidIterationCount {
            got: iterations,
            min: MIN_ITERATIONS,
            max: MAX_ITERATIONS,
        })
    }
}

/// Estimate sampling parameters from recent scores (oldest first).
///
/// - no scores: configured default center and spread
/// - one score: that score with the default spread
/// - several: their mean and population std, with a std below
///   `min_spread` replaced by `degenerate_spread`
pub fn params_from_history(scores: &[f64], cfg: &SimulationConfig) -> DistributionParams {
    match scores {
        [] => DistributionParams {
            center: cfg.default_center,
            spread: cfg.default_spread,
        },
        [only] => DistributionParams {
            center: *only,
            spread: cfg.default_spread,
        },
        _ => {
            let (mean, std) = mean_and_std(scores);
            let spread = if std < cfg.min_spread {
                cfg.degenerate_spread
            } else {
                std
            };
            DistributionParams {
                center: mean,
                spread,
            }
        }
    }
}

/// Run a simulation with a thread-local RNG.
pub fn simulate(
    category: Category,
    params: DistributionParams,
    iterations: usize,
) -> Result<SimulationResult, Error> {
    simulate_with_rng(&mut rand::thread_rng(), category, params, iterations)
}

pub fn simulate_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    category: Category,
    params: DistributionParams,
    iterations: usize,
) -> Result<SimulationResult, Error> {
    validate_iterations(iterations)?;
    let mut samples = sample_clamped(rng, params, iterations)?;
    let (mean, std) = mean_and_std(&samples);

    samples.sort_by(|a, b| a.total_cmp(b));
    let percentiles: BTreeMap<u8, f64> = PERCENTILE_RANKS
        .iter()
        .map(|&rank| (rank, percentile(&samples, f64::from(rank))))
        .collect();

    Ok(SimulationResult {
        category,
        mean,
        std,
        percentiles,
        iteration_count: iterations,
        center: params.center,
        spread: params.spread,
        sampled_at: Utc::now(),
    })
}

/// Draw `n` samples from `Normal(center, spread)`, each clamped into [0, 100].
pub fn sample_clamped<R: Rng + ?Sized>(
    rng: &mut R,
    params: DistributionParams,
    n: usize,
) -> Result<Vec<f64>, Error> {
    if !params.center.is_finite() {
        return Err(Error::InvalidDistribution(format!(
            "center must be finite, got {}",
            params.center
        )));
    }
    if !params.spread.is_finite() || params.spread < 0.0 {
        return Err(Error::InvalidDistribution(format!(
            "spread must be finite and non-negative, got {}",
            params.spread
        )));
    }

    let normal = Normal::new(params.center, params.spread)
        .map_err(|e| Error::InvalidDistribution(e.to_string()))?;
    Ok((0..n)
        .map(|_| normal.sample(rng).clamp(0.0, 100.0))
        .collect())
}

/// Mean and population standard deviation. `(NaN, NaN)` for no samples.
pub fn mean_and_std(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Percentile of ascending `sorted` at `rank` in [0, 100], interpolating
/// linearly between closest ranks.
pub fn percentile(sorted: &[f64], rank: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = (rank.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}
