//! Null-hypothesis surrogate series built by shuffling log-returns.
//!
//! The surrogate keeps the return distribution of the original closes but
//! destroys their temporal ordering: any edge a signal retains on permuted
//! data cannot come from real structure. Open/high/low are rescaled by the
//! permuted-to-original close ratio so intrabar shape is preserved;
//! timestamps and volume are untouched.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use edge_audit_core::{Bar, PriceSeries};

/// Produces statistically matched surrogate series.
pub struct PermutationEngine;

impl PermutationEngine {
    /// Builds one permuted series from `series` using `rng`.
    ///
    /// Steps: take log-returns of closes, shuffle them uniformly
    /// (Fisher-Yates, every ordering equally likely), reconstruct prices
    /// from the first close, pad the tail with the last value if the
    /// reconstruction is short, and rescale open/high/low per bar.
    ///
    /// Series with fewer than two bars have no returns and are returned
    /// unchanged.
    #[must_use]
    pub fn permute(series: &PriceSeries, rng: &mut ChaCha8Rng) -> PriceSeries {
        let n = series.len();
        if n < 2 {
            return series.clone();
        }

        let mut shuffled = series.log_returns();
        shuffled.shuffle(rng);

        let bars = series.bars();
        let mut prices = Vec::with_capacity(n);
        let mut last = bars[0].close;
        prices.push(last);
        for r in &shuffled {
            last *= r.exp();
            prices.push(last);
        }
        while prices.len() < n {
            prices.push(last);
        }

        let permuted = bars
            .iter()
            .zip(&prices)
            .map(|(bar, &close)| {
                let ratio = close / bar.close;
                Bar {
                    timestamp: bar.timestamp,
                    open: bar.open * ratio,
                    high: bar.high * ratio,
                    low: bar.low * ratio,
                    close,
                    volume: bar.volume,
                }
            })
            .collect();

        // Timestamps are copied from a validated series, so the ordering
        // invariant carries over.
        PriceSeries::from_bars_unchecked(permuted)
    }
}
