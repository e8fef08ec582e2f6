use thiserror::Error;

/// Errors produced by the evaluation pipeline.
///
/// Configuration problems (`EmptyGrid`, `EmptyValueList`, `DuplicateParam`,
/// `InsufficientData`) are detected before any scoring work starts.
/// `NoViableResult` is a structural failure of a single stage: every grid
/// point was skipped because it produced no computable returns. Errors from
/// the caller's signal function are wrapped in `Signal` and propagate
/// unchanged.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("parameter grid is empty")]
    EmptyGrid,

    #[error("parameter `{name}` has no candidate values")]
    EmptyValueList { name: String },

    #[error("duplicate parameter `{name}` in grid")]
    DuplicateParam { name: String },

    #[error("invalid price series: {0}")]
    InvalidSeries(String),

    #[error("insufficient data: have {have} bars, need at least {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("no grid point produced a computable return series")]
    NoViableResult,

    #[error(transparent)]
    Signal(#[from] anyhow::Error),
}
