//! Exhaustive in-sample parameter search ("insample excellence").
//!
//! Every point of the grid's Cartesian product is evaluated exactly once in
//! deterministic order: signals, forward returns, objective score. Points
//! whose return series is empty are skipped, not errors; if every point is
//! skipped the search fails with a distinct condition instead of crashing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use edge_audit_core::{
    forward_returns, EvalError, Objective, ParameterAssignment, ParameterGrid, PriceSeries,
    SignalGenerator,
};

/// Score of one evaluated grid point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub assignment: ParameterAssignment,
    pub score: f64,
}

/// Outcome of a full grid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchOutcome {
    /// Best assignment; ties broken first-seen.
    pub best: EvaluationResult,
    /// Every viable grid point, in enumeration order.
    pub results: Vec<EvaluationResult>,
}

/// Exhaustive optimizer over a parameter grid.
pub struct GridSearchOptimizer<'a> {
    signal: &'a dyn SignalGenerator,
    objective: &'a dyn Objective,
}

impl<'a> GridSearchOptimizer<'a> {
    #[must_use]
    pub fn new(signal: &'a dyn SignalGenerator, objective: &'a dyn Objective) -> Self {
        Self { signal, objective }
    }

    /// Evaluates the full Cartesian product on `series`.
    ///
    /// The incumbent best is replaced only by a strictly greater score, so
    /// the first-seen assignment wins ties. Signal-function errors
    /// propagate unchanged.
    pub fn search(
        &self,
        series: &PriceSeries,
        grid: &ParameterGrid,
    ) -> Result<GridSearchOutcome, EvalError> {
        if grid.is_empty() {
            return Err(EvalError::EmptyGrid);
        }

        let mut best: Option<EvaluationResult> = None;
        let mut results = Vec::with_capacity(grid.cardinality());

        for assignment in grid.assignments() {
            let signals = self.signal.signals(series, &assignment)?;
            let returns = forward_returns(series, &signals)?;
            if returns.is_empty() {
                debug!(%assignment, "skipping grid point with no computable returns");
                continue;
            }

            let score = self.objective.score(&returns);
            if score.is_nan() {
                debug!(%assignment, "skipping grid point with undefined score");
                continue;
            }

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(EvaluationResult {
                    assignment: assignment.clone(),
                    score,
                });
            }
            results.push(EvaluationResult { assignment, score });
        }

        match best {
            Some(best) => Ok(GridSearchOutcome { best, results }),
            None => Err(EvalError::NoViableResult),
        }
    }
}
