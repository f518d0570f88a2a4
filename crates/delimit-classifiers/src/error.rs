use thiserror::Error;

/// Errors raised while ingesting data, building or applying a predictor.
#[derive(Debug, Error)]
pub enum DelimitError {
    /// A free-text model label does not follow the `<name>_<integer>` pattern.
    #[error("invalid input format: {0}")]
    InputFormat(String),

    /// Feature arrays do not line up with labels, slices or the sampling dict.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A required configuration key is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A classifier could not be fitted.
    #[error("model fitting failed: {0}")]
    Fit(String),

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, DelimitError>;
