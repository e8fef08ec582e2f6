//! Signal series, the caller-supplied signal capability, and forward
//! returns.
//!
//! A signal function maps a price series and one parameter assignment to a
//! per-bar position series. Warm-up bars are `None` ("undefined"), never
//! zero: an undefined bar is excluded from scoring, while an explicit `0.0`
//! is a real flat position contributing a zero return.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::params::ParameterAssignment;
use crate::series::PriceSeries;

/// Per-bar position series aligned 1:1 with a price series.
///
/// `Some(p)` is a position (1.0 long, -1.0 short, 0.0 flat, fractional
/// allowed); `None` marks a warm-up/undefined bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    positions: Vec<Option<f64>>,
}

impl SignalSeries {
    #[must_use]
    pub fn new(positions: Vec<Option<f64>>) -> Self {
        Self { positions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn positions(&self) -> &[Option<f64>] {
        &self.positions
    }
}

/// Caller-supplied signal capability.
///
/// Implementations must return a series of exactly the input length. Errors
/// are contract violations by the caller and propagate out of the pipeline
/// unchanged.
pub trait SignalGenerator: Send + Sync {
    fn signals(&self, series: &PriceSeries, params: &ParameterAssignment) -> Result<SignalSeries>;
}

impl<F> SignalGenerator for F
where
    F: Fn(&PriceSeries, &ParameterAssignment) -> Result<SignalSeries> + Send + Sync,
{
    fn signals(&self, series: &PriceSeries, params: &ParameterAssignment) -> Result<SignalSeries> {
        self(series, params)
    }
}

/// Realized forward returns: `position(t) * (close(t+1)/close(t) - 1)`.
///
/// Bars with an undefined signal are excluded, never zero-filled. The final
/// bar has no forward close and is always excluded. Errors if the signal
/// series is not aligned 1:1 with the bars.
pub fn forward_returns(series: &PriceSeries, signals: &SignalSeries) -> Result<Vec<f64>> {
    if signals.len() != series.len() {
        anyhow::bail!(
            "signal series length {} does not match price series length {}",
            signals.len(),
            series.len()
        );
    }

    let bars = series.bars();
    let mut returns = Vec::new();
    for t in 0..bars.len().saturating_sub(1) {
        if let Some(position) = signals.positions()[t] {
            let pct = bars[t + 1].close / bars[t].close - 1.0;
            returns.push(position * pct);
        }
    }
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> PriceSeries {
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

    #[test]
    fn forward_returns_uses_next_bar_close() {
        let series = series(&[100.0, 110.0, 99.0]);
        let signals = SignalSeries::new(vec![Some(1.0), Some(-1.0), Some(1.0)]);

        let returns = forward_returns(&series, &signals).unwrap();

        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] - 0.10).abs() < 1e-12); // short into a -10% move
    }

    #[test]
    fn forward_returns_skips_undefined_bars() {
        let series = series(&[100.0, 110.0, 121.0, 133.1]);
        let signals = SignalSeries::new(vec![None, None, Some(1.0), Some(1.0)]);

        let returns = forward_returns(&series, &signals).unwrap();

        // Warm-up bars excluded, final bar has no forward close.
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn explicit_flat_position_is_a_zero_return_not_skipped() {
        let series = series(&[100.0, 110.0, 121.0]);
        let signals = SignalSeries::new(vec![Some(0.0), Some(1.0), Some(1.0)]);

        let returns = forward_returns(&series, &signals).unwrap();

        assert_eq!(returns.len(), 2);
        assert!(returns[0].abs() < f64::EPSILON);
    }

    #[test]
    fn forward_returns_rejects_misaligned_signals() {
        let series = series(&[100.0, 110.0]);
        let signals = SignalSeries::new(vec![Some(1.0)]);
        assert!(forward_returns(&series, &signals).is_err());
    }

    #[test]
    fn all_undefined_yields_empty_returns() {
        let series = series(&[100.0, 110.0, 121.0]);
        let signals = SignalSeries::new(vec![None, None, None]);
        assert!(forward_returns(&series, &signals).unwrap().is_empty());
    }

    #[test]
    fn closure_implements_signal_generator() {
        let generator = |series: &PriceSeries, _params: &ParameterAssignment| {
            Ok(SignalSeries::new(vec![Some(1.0); series.len()]))
        };
        let series = series(&[100.0, 101.0]);
        let signals =
            SignalGenerator::signals(&generator, &series, &ParameterAssignment::default()).unwrap();
        assert_eq!(signals.len(), 2);
    }
}
