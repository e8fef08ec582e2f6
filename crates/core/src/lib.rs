//! Core types for signal evaluation: validated OHLCV series, parameter
//! grids with deterministic Cartesian enumeration, the signal-function
//! seam, and objective functions over realized returns.

pub mod error;
pub mod objective;
pub mod params;
pub mod series;
pub mod signal;

pub use error::EvalError;
pub use objective::{Objective, ProfitFactor, SharpeRatio};
pub use params::{GridIter, ParamValue, ParameterAssignment, ParameterGrid};
pub use series::{Bar, InferredFrequency, PriceSeries};
pub use signal::{forward_returns, SignalGenerator, SignalSeries};
