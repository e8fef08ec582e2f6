//! Objective functions scoring a realized-return sequence.
//!
//! Objectives are pure `&[f64] -> f64` mappings where bigger is better.
//! Numeric degeneracies (no losses, zero variance, too few samples) resolve
//! to documented sentinel values instead of errors.

/// Scores a realized-return sequence; bigger is better.
///
/// Implemented for closures, so any `Fn(&[f64]) -> f64` can be used where
/// the pipeline expects an objective.
pub trait Objective: Send + Sync {
    fn score(&self, returns: &[f64]) -> f64;

    /// Short name used in reports.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn score(&self, returns: &[f64]) -> f64 {
        self(returns)
    }
}

/// Profit factor: sum of positive returns over absolute sum of negatives.
///
/// Sentinels: `+inf` when there are no losing returns but at least one win;
/// `0.0` for an empty sequence or one with no wins and no losses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitFactor;

impl Objective for ProfitFactor {
    fn score(&self, returns: &[f64]) -> f64 {
        let gross_profit: f64 = returns.iter().filter(|r| **r > 0.0).sum();
        let gross_loss: f64 = returns.iter().filter(|r| **r < 0.0).sum::<f64>().abs();

        if gross_loss == 0.0 {
            if gross_profit > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            gross_profit / gross_loss
        }
    }

    fn name(&self) -> &str {
        "profit_factor"
    }
}

/// Annualized Sharpe ratio: `mean / population stdev * sqrt(periods/year)`.
///
/// Sentinel: `0.0` for fewer than two returns or zero variance.
#[derive(Debug, Clone, Copy)]
pub struct SharpeRatio {
    pub periods_per_year: f64,
}

impl Default for SharpeRatio {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
        }
    }
}

impl Objective for SharpeRatio {
    fn score(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return 0.0;
        }
        mean / std_dev * self.periods_per_year.sqrt()
    }

    fn name(&self) -> &str {
        "sharpe_ratio"
    }
}
