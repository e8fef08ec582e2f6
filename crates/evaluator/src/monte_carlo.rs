//! Monte Carlo permutation testing.
//!
//! Both tests answer the same question: how often does a statistically
//! matched surrogate series score at least as well as the real one? The
//! in-sample variant scores a fixed assignment on fully permuted data; the
//! walk-forward variant re-runs the whole rolling pipeline on series whose
//! training head is intact and whose out-of-sample tail is permuted.
//! P-values are one-sided: `count(permuted >= original) / valid`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use edge_audit_core::{
    forward_returns, EvalError, Objective, ParameterAssignment, ParameterGrid, PriceSeries,
    SignalGenerator,
};

use crate::permutation::PermutationEngine;
use crate::walk_forward::{WalkForwardConfig, WalkForwardEngine, WalkForwardReport};

/// Configuration for permutation tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of surrogate series to evaluate.
    pub n_permutations: usize,
    /// Base RNG seed; `None` draws one from the thread RNG. Permutation `i`
    /// always uses `base.wrapping_add(i)`, so a fixed seed reproduces the
    /// full run regardless of thread scheduling.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_permutations: 200,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    #[must_use]
    pub fn new(n_permutations: usize) -> Self {
        Self {
            n_permutations,
            seed: None,
        }
    }

    /// Pins the base seed for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Moments and range of the permuted-score distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl DistributionSummary {
    /// Summarizes `values`; an empty slice yields all zeros.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                n: 0,
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        Self {
            n,
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        }
    }
}

/// Result of one permutation test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationTestResult {
    /// Score achieved on the real series.
    pub original_score: f64,
    /// One-sided p-value; 1.0 when no permutation produced a valid score.
    pub p_value: f64,
    /// Permutations requested.
    pub n_permutations: usize,
    /// Permutations that produced a valid score.
    pub n_valid: usize,
    pub distribution: DistributionSummary,
}

/// Runs in-sample and walk-forward permutation tests.
pub struct MonteCarloValidator<'a> {
    signal: &'a dyn SignalGenerator,
    objective: &'a dyn Objective,
    config: MonteCarloConfig,
}

impl<'a> MonteCarloValidator<'a> {
    #[must_use]
    pub fn new(
        signal: &'a dyn SignalGenerator,
        objective: &'a dyn Objective,
        config: MonteCarloConfig,
    ) -> Self {
        Self {
            signal,
            objective,
            config,
        }
    }

    fn base_seed(&self) -> u64 {
        self.config
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen())
    }

    /// In-sample permutation test of a fixed assignment.
    ///
    /// The assignment is scored on the real series, then on
    /// `n_permutations` fully permuted surrogates. Permutations whose
    /// return series is empty are counted as invalid, not errors.
    pub fn insample_test(
        &self,
        series: &PriceSeries,
        assignment: &ParameterAssignment,
    ) -> Result<PermutationTestResult, EvalError> {
        let original = self
            .score_assignment(series, assignment)?
            .ok_or(EvalError::NoViableResult)?;

        let base = self.base_seed();
        let scores = (0..self.config.n_permutations)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(base.wrapping_add(i as u64));
                let permuted = PermutationEngine::permute(series, &mut rng);
                self.score_assignment(&permuted, assignment)
            })
            .collect::<Result<Vec<Option<f64>>, EvalError>>()?;

        Ok(Self::summarize(
            original,
            self.config.n_permutations,
            scores,
        ))
    }

    /// Walk-forward permutation test.
    ///
    /// Each surrogate keeps the first training window of real bars and
    /// permutes everything after it, so only the out-of-sample portion is
    /// scrambled. The full rolling pipeline then re-runs on the surrogate
    /// with the bar counts already resolved for the real series.
    /// Surrogates on which the pipeline finds no viable step are counted
    /// as invalid.
    pub fn walk_forward_test(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
        wf_config: &WalkForwardConfig,
        original: &WalkForwardReport,
    ) -> Result<PermutationTestResult, EvalError> {
        let engine = WalkForwardEngine::new(self.signal, self.objective, wf_config.clone());
        let training_bars = original.training_bars;
        let step_bars = original.step_bars;

        let base = self.base_seed();
        let scores = (0..self.config.n_permutations)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(base.wrapping_add(i as u64));
                let permuted = permute_after_training(series, training_bars, &mut rng);
                match engine.run_with_bars(
                    &permuted,
                    grid,
                    training_bars,
                    step_bars,
                    original.frequency_fallback,
                ) {
                    Ok(report) => Ok(Some(report.overall_score)),
                    Err(EvalError::NoViableResult | EvalError::InsufficientData { .. }) => {
                        debug!(permutation = i, "surrogate produced no viable pipeline run");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .collect::<Result<Vec<Option<f64>>, EvalError>>()?;

        Ok(Self::summarize(
            original.overall_score,
            self.config.n_permutations,
            scores,
        ))
    }

    fn score_assignment(
        &self,
        series: &PriceSeries,
        assignment: &ParameterAssignment,
    ) -> Result<Option<f64>, EvalError> {
        let signals = self.signal.signals(series, assignment)?;
        let returns = forward_returns(series, &signals)?;
        if returns.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.objective.score(&returns)))
    }

    fn summarize(
        original: f64,
        n_permutations: usize,
        scores: Vec<Option<f64>>,
    ) -> PermutationTestResult {
        let valid: Vec<f64> = scores.into_iter().flatten().collect();
        let p_value = if valid.is_empty() {
            1.0
        } else {
            valid.iter().filter(|&&s| s >= original).count() as f64 / valid.len() as f64
        };
        PermutationTestResult {
            original_score: original,
            p_value,
            n_permutations,
            n_valid: valid.len(),
            distribution: DistributionSummary::from_values(&valid),
        }
    }
}

/// Permutes everything after the first `training_bars` bars.
///
/// The head is copied verbatim so the first training window of the
/// walk-forward pipeline sees real data.
fn permute_after_training(
    series: &PriceSeries,
    training_bars: usize,
    rng: &mut ChaCha8Rng,
) -> PriceSeries {
    if training_bars >= series.len() {
        return series.clone();
    }
    let tail = series.slice(training_bars..series.len());
    let permuted_tail = PermutationEngine::permute(&tail, rng);

    let mut bars = series.bars()[..training_bars].to_vec();
    bars.extend_from_slice(permuted_tail.bars());
    PriceSeries::from_bars_unchecked(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::{Duration, TimeZone, Utc};
    use edge_audit_core::{Bar, ProfitFactor, SignalSeries};

    // ============================================================
    // Test Helpers
    // ============================================================

    fn daily_series(closes: &[f64]) -> PriceSeries {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: base + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    fn trending_series(n: usize) -> PriceSeries {
        let mut closes = Vec::with_capacity(n);
        let mut price = 100.0;
        for i in 0..n {
            price *= if i % 3 == 2 { 0.995 } else { 1.01 };
            closes.push(price);
        }
        daily_series(&closes)
    }

    fn random_walk_series(n: usize, seed: u64) -> PriceSeries {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut closes = Vec::with_capacity(n);
        let mut price = 100.0;
        for _ in 0..n {
            price *= 1.0 + rng.gen_range(-0.01..0.01);
            closes.push(price);
        }
        daily_series(&closes)
    }

    fn sma_momentum(
        series: &PriceSeries,
        params: &ParameterAssignment,
    ) -> anyhow::Result<SignalSeries> {
        let lookback = params
            .get_int("lookback")
            .ok_or_else(|| anyhow!("missing parameter `lookback`"))?;
        let lookback = usize::try_from(lookback).map_err(|_| anyhow!("negative lookback"))?;

        let closes: Vec<f64> = series.closes().collect();
        let mut positions = vec![None; closes.len()];
        for t in lookback..closes.len() {
            let sma = closes[t - lookback..t].iter().sum::<f64>() / lookback as f64;
            positions[t] = Some(if closes[t] > sma { 1.0 } else { -1.0 });
        }
        Ok(SignalSeries::new(positions))
    }

    fn assignment(lookback: i64) -> ParameterAssignment {
        let mut grid = ParameterGrid::new();
        grid.insert_ints("lookback", [lookback]).unwrap();
        grid.assignments().next().unwrap()
    }

    fn lookback_grid(values: &[i64]) -> ParameterGrid {
        let mut grid = ParameterGrid::new();
        grid.insert_ints("lookback", values.iter().copied()).unwrap();
        grid
    }

    // ============================================================
    // In-sample Test
    // ============================================================

    #[test]
    fn p_value_is_a_probability() {
        let series = trending_series(80);
        let config = MonteCarloConfig::new(25).with_seed(7);
        let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);

        let result = validator.insample_test(&series, &assignment(5)).unwrap();

        assert!(result.p_value >= 0.0 && result.p_value <= 1.0);
        assert_eq!(result.n_permutations, 25);
        assert_eq!(result.n_valid, 25);
        assert_eq!(result.distribution.n, 25);
        assert!(result.distribution.min <= result.distribution.max);
    }

    #[test]
    fn zero_valid_permutations_yields_p_of_one() {
        let series = trending_series(60);
        let config = MonteCarloConfig::new(0).with_seed(1);
        let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);

        let result = validator.insample_test(&series, &assignment(5)).unwrap();

        assert_eq!(result.n_valid, 0);
        assert!((result.p_value - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.distribution.n, 0);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let series = trending_series(80);
        let config = MonteCarloConfig::new(20).with_seed(42);
        let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);

        let first = validator.insample_test(&series, &assignment(5)).unwrap();
        let second = validator.insample_test(&series, &assignment(5)).unwrap();

        assert!((first.p_value - second.p_value).abs() < f64::EPSILON);
        assert!((first.distribution.mean - second.distribution.mean).abs() < f64::EPSILON);
    }

    #[test]
    fn different_seeds_can_differ() {
        let series = trending_series(80);
        let validator_a = MonteCarloValidator::new(
            &sma_momentum,
            &ProfitFactor,
            MonteCarloConfig::new(30).with_seed(1),
        );
        let validator_b = MonteCarloValidator::new(
            &sma_momentum,
            &ProfitFactor,
            MonteCarloConfig::new(30).with_seed(2),
        );

        let a = validator_a.insample_test(&series, &assignment(5)).unwrap();
        let b = validator_b.insample_test(&series, &assignment(5)).unwrap();

        assert!((a.distribution.mean - b.distribution.mean).abs() > 1e-12);
    }

    #[test]
    fn undefined_assignment_fails_instead_of_scoring_nothing() {
        // Lookback longer than the series: no signal is ever defined.
        let series = trending_series(10);
        let config = MonteCarloConfig::new(5).with_seed(3);
        let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);

        assert!(matches!(
            validator.insample_test(&series, &assignment(50)),
            Err(EvalError::NoViableResult)
        ));
    }

    #[test]
    fn random_walk_rarely_looks_significant() {
        // On seeded random walks momentum has no real edge, so small
        // p-values should be about as rare as their nominal level.
        let mut low_p = 0;
        let mut p_sum = 0.0;
        let trials = 20;
        for trial in 0..trials {
            let series = random_walk_series(120, 1000 + trial);
            let config = MonteCarloConfig::new(50).with_seed(trial);
            let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);
            let result = validator.insample_test(&series, &assignment(5)).unwrap();
            if result.p_value < 0.05 {
                low_p += 1;
            }
            p_sum += result.p_value;
        }
        assert!(low_p <= 5, "{low_p} of {trials} trials looked significant");
        assert!(p_sum / trials as f64 > 0.2);
    }

    // ============================================================
    // Walk-forward Test
    // ============================================================

    #[test]
    fn walk_forward_test_reuses_original_bar_counts() {
        let series = trending_series(120);
        let wf_config = WalkForwardConfig::new(60, 20);
        let engine = WalkForwardEngine::new(&sma_momentum, &ProfitFactor, wf_config.clone());
        let grid = lookback_grid(&[3, 5]);
        let report = engine.run(&series, &grid).unwrap();

        let config = MonteCarloConfig::new(10).with_seed(11);
        let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);
        let result = validator
            .walk_forward_test(&series, &grid, &wf_config, &report)
            .unwrap();

        assert_eq!(result.n_permutations, 10);
        assert!(result.n_valid <= 10);
        assert!(result.p_value >= 0.0 && result.p_value <= 1.0);
        assert!((result.original_score - report.overall_score).abs() < f64::EPSILON);
    }

    #[test]
    fn walk_forward_test_is_reproducible_with_a_seed() {
        let series = trending_series(120);
        let wf_config = WalkForwardConfig::new(60, 20);
        let engine = WalkForwardEngine::new(&sma_momentum, &ProfitFactor, wf_config.clone());
        let grid = lookback_grid(&[3, 5]);
        let report = engine.run(&series, &grid).unwrap();

        let config = MonteCarloConfig::new(10).with_seed(99);
        let validator = MonteCarloValidator::new(&sma_momentum, &ProfitFactor, config);

        let first = validator
            .walk_forward_test(&series, &grid, &wf_config, &report)
            .unwrap();
        let second = validator
            .walk_forward_test(&series, &grid, &wf_config, &report)
            .unwrap();

        assert!((first.p_value - second.p_value).abs() < f64::EPSILON);
        assert_eq!(first.n_valid, second.n_valid);
    }

    // ============================================================
    // Surrogate Construction
    // ============================================================

    #[test]
    fn head_bars_stay_untouched_and_tail_is_permuted() {
        let series = trending_series(100);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let permuted = permute_after_training(&series, 60, &mut rng);

        assert_eq!(permuted.len(), 100);
        for (original, surrogate) in series.bars()[..60].iter().zip(&permuted.bars()[..60]) {
            assert!((original.close - surrogate.close).abs() < f64::EPSILON);
        }
        let tail_moved = series.bars()[60..]
            .iter()
            .zip(&permuted.bars()[60..])
            .any(|(a, b)| (a.close - b.close).abs() > 1e-12);
        assert!(tail_moved, "tail permutation left every close in place");
    }

    #[test]
    fn training_head_longer_than_series_clones() {
        let series = trending_series(20);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let permuted = permute_after_training(&series, 50, &mut rng);

        for (a, b) in series.bars().iter().zip(permuted.bars()) {
            assert!((a.close - b.close).abs() < f64::EPSILON);
        }
    }

    // ============================================================
    // Distribution Summary
    // ============================================================

    #[test]
    fn distribution_summary_moments() {
        let summary = DistributionSummary::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(summary.n, 4);
        assert!((summary.mean - 2.5).abs() < 1e-12);
        assert!((summary.std_dev - (1.25f64).sqrt()).abs() < 1e-12);
        assert!((summary.min - 1.0).abs() < f64::EPSILON);
        assert!((summary.max - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_distribution_summary_is_zeroed() {
        let summary = DistributionSummary::from_values(&[]);
        assert_eq!(summary.n, 0);
        assert!((summary.mean).abs() < f64::EPSILON);
        assert!((summary.std_dev).abs() < f64::EPSILON);
    }
}
