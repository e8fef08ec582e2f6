//! Four-stage evaluation pipeline.
//!
//! Stages run in order: exhaustive in-sample optimization, in-sample
//! permutation test, walk-forward out-of-sample test, walk-forward
//! permutation test. A stage that cannot produce a result marks itself
//! failed and the stages depending on it are skipped; the report is always
//! complete, with a verdict derived from whatever evidence survived.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::info;

use edge_audit_core::{EvalError, Objective, ParameterGrid, PriceSeries, SignalGenerator};

use crate::grid_search::{GridSearchOptimizer, GridSearchOutcome};
use crate::monte_carlo::{MonteCarloConfig, MonteCarloValidator, PermutationTestResult};
use crate::walk_forward::{WalkForwardConfig, WalkForwardEngine, WalkForwardReport};

/// What happened to one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed(T),
    /// The stage ran but produced no result.
    Failed { reason: String },
    /// A prerequisite stage failed, so this one never ran.
    Skipped { reason: String },
}

impl<T> StageOutcome<T> {
    /// The stage's result, if it completed.
    #[must_use]
    pub fn completed(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Final assessment of a signal function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Both permutation tests significant at 5% and profitable out of sample.
    Excellent,
    /// Both permutation tests significant at 10% and profitable out of sample.
    Good,
    /// Profitable out of sample but not statistically significant.
    Marginal,
    /// No out-of-sample profitability.
    Poor,
}

impl Verdict {
    /// Derives the verdict from the evidence the pipeline gathered.
    ///
    /// Missing p-values (a failed or skipped test) fail the significance
    /// criteria, so the best a partial run can earn is `Marginal`.
    #[must_use]
    pub fn from_stages(
        insample_p: Option<f64>,
        walk_forward_p: Option<f64>,
        profitable: bool,
    ) -> Self {
        match (insample_p, walk_forward_p) {
            (Some(a), Some(b)) if a < 0.05 && b < 0.05 && profitable => Self::Excellent,
            (Some(a), Some(b)) if a < 0.10 && b < 0.10 && profitable => Self::Good,
            _ if profitable => Self::Marginal,
            _ => Self::Poor,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Marginal => "MARGINAL",
            Self::Poor => "POOR",
        };
        f.write_str(label)
    }
}

/// Full pipeline report: one outcome per stage plus the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub insample: StageOutcome<GridSearchOutcome>,
    pub insample_test: StageOutcome<PermutationTestResult>,
    pub walk_forward: StageOutcome<WalkForwardReport>,
    pub walk_forward_test: StageOutcome<PermutationTestResult>,
    pub verdict: Verdict,
}

impl EvaluationReport {
    /// Human-readable multi-section summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:=<62}", "");
        let _ = writeln!(out, "STEP 1: IN-SAMPLE OPTIMIZATION");
        match &self.insample {
            StageOutcome::Completed(outcome) => {
                let _ = writeln!(out, "  best parameters: {}", outcome.best.assignment);
                let _ = writeln!(out, "  best score:      {:.4}", outcome.best.score);
                let _ = writeln!(out, "  points searched: {}", outcome.results.len());
            }
            StageOutcome::Failed { reason } | StageOutcome::Skipped { reason } => {
                let _ = writeln!(out, "  {reason}");
            }
        }

        let _ = writeln!(out, "{:=<62}", "");
        let _ = writeln!(out, "STEP 2: IN-SAMPLE PERMUTATION TEST");
        Self::write_permutation_section(&mut out, &self.insample_test);

        let _ = writeln!(out, "{:=<62}", "");
        let _ = writeln!(out, "STEP 3: WALK-FORWARD OUT-OF-SAMPLE TEST");
        match &self.walk_forward {
            StageOutcome::Completed(report) => {
                let _ = writeln!(out, "  windows:       {}", report.steps.len());
                let _ = writeln!(out, "  oos returns:   {}", report.oos_returns.len());
                let _ = writeln!(out, "  overall score: {:.4}", report.overall_score);
                if report.frequency_fallback {
                    let _ = writeln!(out, "  warning: sampling frequency defaulted to 1 bar/day");
                }
            }
            StageOutcome::Failed { reason } | StageOutcome::Skipped { reason } => {
                let _ = writeln!(out, "  {reason}");
            }
        }

        let _ = writeln!(out, "{:=<62}", "");
        let _ = writeln!(out, "STEP 4: WALK-FORWARD PERMUTATION TEST");
        Self::write_permutation_section(&mut out, &self.walk_forward_test);

        let _ = writeln!(out, "{:=<62}", "");
        let _ = writeln!(out, "FINAL ASSESSMENT: {}", self.verdict);
        out
    }

    fn write_permutation_section(out: &mut String, stage: &StageOutcome<PermutationTestResult>) {
        match stage {
            StageOutcome::Completed(result) => {
                let _ = writeln!(out, "  original score: {:.4}", result.original_score);
                let _ = writeln!(
                    out,
                    "  permutations:   {} ({} valid)",
                    result.n_permutations, result.n_valid
                );
                let _ = writeln!(
                    out,
                    "  permuted mean:  {:.4} (sd {:.4})",
                    result.distribution.mean, result.distribution.std_dev
                );
                let _ = writeln!(out, "  p-value:        {:.4}", result.p_value);
            }
            StageOutcome::Failed { reason } | StageOutcome::Skipped { reason } => {
                let _ = writeln!(out, "  {reason}");
            }
        }
    }
}

/// Runs the four stages end to end.
pub struct Evaluator<'a> {
    signal: &'a dyn SignalGenerator,
    objective: &'a dyn Objective,
    grid: ParameterGrid,
    walk_forward: WalkForwardConfig,
    monte_carlo: MonteCarloConfig,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub fn new(
        signal: &'a dyn SignalGenerator,
        objective: &'a dyn Objective,
        grid: ParameterGrid,
    ) -> Self {
        Self {
            signal,
            objective,
            grid,
            walk_forward: WalkForwardConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
        }
    }

    /// Overrides the walk-forward windowing.
    #[must_use]
    pub fn with_walk_forward(mut self, config: WalkForwardConfig) -> Self {
        self.walk_forward = config;
        self
    }

    /// Overrides the permutation-test settings.
    #[must_use]
    pub fn with_monte_carlo(mut self, config: MonteCarloConfig) -> Self {
        self.monte_carlo = config;
        self
    }

    /// Runs the full pipeline on `series`.
    ///
    /// Configuration problems fail before any stage runs: an empty grid, a
    /// series too short to yield a single forward return, or a training
    /// window longer than the whole series. Stage-level shortfalls (no
    /// viable grid point, not enough bars for a full walk-forward window)
    /// are recorded in the report instead of aborting; signal-function
    /// errors always abort.
    pub fn run(&self, series: &PriceSeries) -> Result<EvaluationReport, EvalError> {
        if self.grid.is_empty() {
            return Err(EvalError::EmptyGrid);
        }
        if series.len() < 2 {
            return Err(EvalError::InsufficientData {
                have: series.len(),
                need: 2,
            });
        }
        let training_bars = series
            .infer_frequency()
            .bars_for(self.walk_forward.training_window)
            .max(1);
        if training_bars > series.len() {
            return Err(EvalError::InsufficientData {
                have: series.len(),
                need: training_bars,
            });
        }

        let optimizer = GridSearchOptimizer::new(self.signal, self.objective);
        let validator =
            MonteCarloValidator::new(self.signal, self.objective, self.monte_carlo.clone());
        let wf_engine =
            WalkForwardEngine::new(self.signal, self.objective, self.walk_forward.clone());

        info!(
            points = self.grid.cardinality(),
            "stage 1: in-sample optimization"
        );
        let insample = stage(optimizer.search(series, &self.grid))?;

        let insample_test = match insample.completed() {
            Some(outcome) => {
                info!(
                    permutations = self.monte_carlo.n_permutations,
                    "stage 2: in-sample permutation test"
                );
                stage(validator.insample_test(series, &outcome.best.assignment))?
            }
            None => StageOutcome::Skipped {
                reason: "in-sample optimization produced no result".to_string(),
            },
        };

        info!("stage 3: walk-forward out-of-sample test");
        let walk_forward = stage(wf_engine.run(series, &self.grid))?;

        let walk_forward_test = match walk_forward.completed() {
            Some(report) => {
                info!(
                    permutations = self.monte_carlo.n_permutations,
                    "stage 4: walk-forward permutation test"
                );
                stage(validator.walk_forward_test(series, &self.grid, &self.walk_forward, report))?
            }
            None => StageOutcome::Skipped {
                reason: "walk-forward test produced no result".to_string(),
            },
        };

        let profitable = walk_forward
            .completed()
            .map_or(false, |report| report.overall_score > 1.0);
        let verdict = Verdict::from_stages(
            insample_test.completed().map(|r| r.p_value),
            walk_forward_test.completed().map(|r| r.p_value),
            profitable,
        );
        info!(%verdict, "evaluation complete");

        Ok(EvaluationReport {
            insample,
            insample_test,
            walk_forward,
            walk_forward_test,
            verdict,
        })
    }
}

/// Maps stage-level shortfalls to a failed outcome; other errors abort.
fn stage<T>(result: Result<T, EvalError>) -> Result<StageOutcome<T>, EvalError> {
    match result {
        Ok(value) => Ok(StageOutcome::Completed(value)),
        Err(e @ (EvalError::NoViableResult | EvalError::InsufficientData { .. })) => {
            Ok(StageOutcome::Failed {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}
