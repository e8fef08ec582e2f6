//! OHLCV price series and sampling-frequency inference.
//!
//! A [`PriceSeries`] is an immutable, validated sequence of bars with
//! strictly increasing timestamps. All evaluation stages consume slices of
//! one series; nothing in the pipeline ever mutates a series in place.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::warn;

use crate::error::EvalError;

/// One OHLCV record at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Immutable OHLCV time series with strictly increasing timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Validates and wraps a sequence of bars.
    ///
    /// Requires strictly increasing timestamps, finite OHLCV fields, and
    /// strictly positive closes (log-returns are taken over closes).
    pub fn new(bars: Vec<Bar>) -> Result<Self, EvalError> {
        for (i, bar) in bars.iter().enumerate() {
            let fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
            if fields.iter().any(|v| !v.is_finite()) {
                return Err(EvalError::InvalidSeries(format!(
                    "non-finite field in bar {i} at {}",
                    bar.timestamp
                )));
            }
            if bar.close <= 0.0 {
                return Err(EvalError::InvalidSeries(format!(
                    "non-positive close {} in bar {i} at {}",
                    bar.close, bar.timestamp
                )));
            }
            if i > 0 && bars[i - 1].timestamp >= bar.timestamp {
                return Err(EvalError::InvalidSeries(format!(
                    "timestamps not strictly increasing at bar {i} ({})",
                    bar.timestamp
                )));
            }
        }
        Ok(Self { bars })
    }

    /// Wraps bars without validation.
    ///
    /// The caller must uphold the ordering and finiteness invariants. Used
    /// when a series is derived from an already-validated one (slicing,
    /// permutation) and the invariants carry over by construction.
    #[must_use]
    pub fn from_bars_unchecked(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Returns the sub-series covering `range` of bar indices.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds, like slice indexing.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self::from_bars_unchecked(self.bars[range].to_vec())
    }

    /// Iterator over close prices.
    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    /// Per-bar log-returns of closes: `ln(close[i] / close[i-1])` for
    /// `i = 1..n`. Empty for series shorter than two bars.
    #[must_use]
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }

    /// Infers the sampling frequency from the median timestamp spacing.
    ///
    /// Series with fewer than two bars have no observable spacing; they
    /// fall back to one bar per day and the result is flagged.
    #[must_use]
    pub fn infer_frequency(&self) -> InferredFrequency {
        if self.bars.len() < 2 {
            warn!(bars = self.bars.len(), "sampling frequency undetermined, assuming 1 bar/day");
            return InferredFrequency {
                bar_seconds: SECONDS_PER_DAY,
                fallback: true,
            };
        }

        let mut deltas: Vec<i64> = self
            .bars
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
            .collect();
        deltas.sort_unstable();
        let median = deltas[deltas.len() / 2];

        if median <= 0 {
            // Cannot happen for a validated series; kept for unchecked inputs.
            warn!("non-positive median bar spacing, assuming 1 bar/day");
            return InferredFrequency {
                bar_seconds: SECONDS_PER_DAY,
                fallback: true,
            };
        }

        InferredFrequency {
            bar_seconds: median,
            fallback: false,
        }
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Sampling frequency inferred from timestamp spacing.
///
/// `fallback` is true when the spacing could not be determined and the
/// 1 bar/day default was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredFrequency {
    /// Seconds between consecutive bars.
    pub bar_seconds: i64,
    /// True if the frequency was undetermined and defaulted.
    pub fallback: bool,
}

impl InferredFrequency {
    /// Converts a calendar duration into a bar count at this frequency.
    #[must_use]
    pub fn bars_for(&self, window: Duration) -> usize {
        let bars = window.num_seconds() / self.bar_seconds;
        usize::try_from(bars.max(0)).unwrap_or(0)
    }
}
