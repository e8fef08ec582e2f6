//! Statistical evaluation pipeline for trading signal functions.
//!
//! Answers whether a parameterized signal function has genuine predictive
//! edge or merely fit noise, in four stages: exhaustive in-sample
//! optimization, an in-sample Monte Carlo permutation test, rolling
//! walk-forward out-of-sample testing, and a walk-forward permutation
//! test. [`Evaluator`] runs all four and renders a verdict.

pub mod grid_search;
pub mod monte_carlo;
pub mod orchestrator;
pub mod permutation;
pub mod walk_forward;

pub use grid_search::{EvaluationResult, GridSearchOptimizer, GridSearchOutcome};
pub use monte_carlo::{
    DistributionSummary, MonteCarloConfig, MonteCarloValidator, PermutationTestResult,
};
pub use orchestrator::{EvaluationReport, Evaluator, StageOutcome, Verdict};
pub use permutation::PermutationEngine;
pub use walk_forward::{WalkForwardConfig, WalkForwardEngine, WalkForwardReport, WalkForwardStep};
