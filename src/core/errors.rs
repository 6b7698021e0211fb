// src/core/errors.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),
    #[error("Illegal State: {0}")]
    IllegalState(String),
    #[error("Incompatible Dimensions: {0}")]
    IncompatibleDimensions(String),
    #[error("Model Prediction Error: {0}")]
    ModelPrediction(String),
    #[error("Numerical Error: {0}")]
    Numerical(String),
    #[error("Configuration Error: {0}")]
    Config(String),
    #[error("Ndarray Error: {0}")]
    Ndarray(#[from] ndarray::ShapeError),
}

impl From<toml::de::Error> for TrustError {
    fn from(err: toml::de::Error) -> Self {
        TrustError::Config(err.to_string())
    }
}

impl From<std::io::Error> for TrustError {
    fn from(err: std::io::Error) -> Self {
        TrustError::Config(format!("failed to read configuration: {}", err))
    }
}

// Convenience type alias for Result
pub type Result<T> = std::result::Result<T, TrustError>;
