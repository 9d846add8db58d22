use thiserror::Error;

/// Errors surfaced by the modeling pipeline.
///
/// Validation failures happen before any state mutation; numerical
/// degeneracies (zero std, zero-variance returns, empty denominators)
/// are resolved to defaults instead of erroring.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad input data (too few candles, non-positive prices, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bad caller-supplied configuration (folds, thresholds, rates, ...).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Feature width of the data does not match the model.
    #[error("dimension mismatch: model expects {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
