//! Rolling walk-forward out-of-sample testing.
//!
//! The series is split into rolling train/test windows. Each window is
//! re-optimized from scratch on the train slice and the winning assignment
//! is scored on the next unseen test slice, simulating sequential live
//! deployment. The overall score concatenates every step's out-of-sample
//! returns and scores them once; averaging per-step scores would weight
//! uneven sample sizes incorrectly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use edge_audit_core::{
    forward_returns, EvalError, Objective, ParameterAssignment, ParameterGrid, PriceSeries,
    SignalGenerator,
};

use crate::grid_search::GridSearchOptimizer;

/// Configuration for walk-forward testing.
///
/// Windows are calendar durations; they are converted to bar counts with
/// the sampling frequency inferred from the series itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Length of each training window.
    #[serde(with = "duration_seconds")]
    pub training_window: Duration,
    /// How far each step advances; also the test window length.
    #[serde(with = "duration_seconds")]
    pub step: Duration,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            training_window: Duration::days(365 * 4),
            step: Duration::days(90),
        }
    }
}

impl WalkForwardConfig {
    /// Creates a config with day-granularity windows.
    #[must_use]
    pub fn new(train_days: i64, step_days: i64) -> Self {
        Self {
            training_window: Duration::days(train_days),
            step: Duration::days(step_days),
        }
    }

    /// Sets the training window.
    #[must_use]
    pub fn with_training_window(mut self, window: Duration) -> Self {
        self.training_window = window;
        self
    }

    /// Sets the step/test window.
    #[must_use]
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }
}

/// One completed train/test window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardStep {
    /// Train slice bar indices, `[train_start, train_end)`.
    pub train_start: usize,
    pub train_end: usize,
    /// Test slice bar indices, `[test_start, test_end)`.
    pub test_start: usize,
    pub test_end: usize,
    /// Winning assignment from this window's re-optimization.
    pub best_assignment: ParameterAssignment,
    /// In-sample score of the winning assignment.
    pub train_score: f64,
    /// Out-of-sample score on the test slice.
    pub test_score: f64,
    /// Timestamp of the last bar in the test slice.
    pub test_end_timestamp: DateTime<Utc>,
}

/// Results of a walk-forward run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub steps: Vec<WalkForwardStep>,
    /// Score of all out-of-sample returns concatenated and scored once.
    pub overall_score: f64,
    /// Concatenated out-of-sample returns, in step order.
    pub oos_returns: Vec<f64>,
    /// Bar counts the calendar windows resolved to.
    pub training_bars: usize,
    pub step_bars: usize,
    /// True if the sampling frequency was undetermined and the 1 bar/day
    /// default was applied.
    pub frequency_fallback: bool,
}

/// Walk-forward engine: rolling re-optimization and out-of-sample scoring.
pub struct WalkForwardEngine<'a> {
    signal: &'a dyn SignalGenerator,
    objective: &'a dyn Objective,
    config: WalkForwardConfig,
}

impl<'a> WalkForwardEngine<'a> {
    #[must_use]
    pub fn new(
        signal: &'a dyn SignalGenerator,
        objective: &'a dyn Objective,
        config: WalkForwardConfig,
    ) -> Self {
        Self {
            signal,
            objective,
            config,
        }
    }

    /// Runs walk-forward testing over the full series.
    ///
    /// The calendar windows are converted to bar counts using the series'
    /// inferred sampling frequency; the same rule applies everywhere,
    /// including the walk-forward permutation test.
    pub fn run(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
    ) -> Result<WalkForwardReport, EvalError> {
        let freq = series.infer_frequency();
        let training_bars = freq.bars_for(self.config.training_window).max(1);
        let step_bars = freq.bars_for(self.config.step).max(1);
        self.run_with_bars(series, grid, training_bars, step_bars, freq.fallback)
    }

    /// Walk-forward with explicit bar counts.
    ///
    /// Used by [`run`](Self::run) and by the walk-forward permutation test,
    /// which must reuse the bar counts resolved on the original series.
    pub(crate) fn run_with_bars(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
        training_bars: usize,
        step_bars: usize,
        frequency_fallback: bool,
    ) -> Result<WalkForwardReport, EvalError> {
        if grid.is_empty() {
            return Err(EvalError::EmptyGrid);
        }

        let n = series.len();
        // One full train window plus one full test window; a series of
        // exactly training_bars bars yields zero steps.
        if n < training_bars + step_bars {
            return Err(EvalError::InsufficientData {
                have: n,
                need: training_bars + step_bars,
            });
        }

        let optimizer = GridSearchOptimizer::new(self.signal, self.objective);
        let mut steps = Vec::new();
        let mut oos_returns = Vec::new();

        let mut offset = 0;
        while offset + training_bars < n {
            let train_end = offset + training_bars;
            let test_end = train_end + step_bars;
            if test_end > n {
                debug!(offset, "dropping final partial test window");
                break;
            }

            let train = series.slice(offset..train_end);
            let outcome = match optimizer.search(&train, grid) {
                Ok(outcome) => outcome,
                Err(EvalError::NoViableResult) => {
                    debug!(offset, "no viable grid point in training window, skipping");
                    offset += step_bars;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let test = series.slice(train_end..test_end);
            let signals = self.signal.signals(&test, &outcome.best.assignment)?;
            let returns = forward_returns(&test, &signals)?;
            if returns.is_empty() {
                debug!(offset, "no computable out-of-sample returns, skipping");
                offset += step_bars;
                continue;
            }

            let test_score = self.objective.score(&returns);
            let Some(last_bar) = test.bars().last() else {
                break;
            };
            steps.push(WalkForwardStep {
                train_start: offset,
                train_end,
                test_start: train_end,
                test_end,
                best_assignment: outcome.best.assignment,
                train_score: outcome.best.score,
                test_score,
                test_end_timestamp: last_bar.timestamp,
            });
            oos_returns.extend(returns);

            offset += step_bars;
        }

        if steps.is_empty() {
            return Err(EvalError::NoViableResult);
        }

        let overall_score = self.objective.score(&oos_returns);
        Ok(WalkForwardReport {
            steps,
            overall_score,
            oos_returns,
            training_bars,
            step_bars,
            frequency_fallback,
        })
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(seconds))
    }
}
