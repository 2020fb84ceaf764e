use thiserror::Error;

/// Errors that can occur while dispatching training callbacks
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Failure reported by the model collaborator, e.g. while saving weights
    #[error(transparent)]
    Model(#[from] anyhow::Error),
    /// The model was never attached with `set_model`, or has been dropped
    #[error("Model is not available to the callback")]
    ModelUnavailable,
    /// The model is already borrowed by the training loop
    #[error("Model is busy: {0}")]
    ModelBusy(String),
    /// A log entry the callback depends on was not supplied
    #[error("Missing log entry '{key}' in {hook}")]
    MissingLog {
        key: &'static str,
        hook: &'static str,
    },
    /// Wrapper for HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Wrapper for JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper for standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error raised by the plotting backend
    #[error("Plot error: {0}")]
    Plot(String),
    /// Error for rejected plot settings
    #[error("Invalid plot configuration: {0}")]
    InvalidPlotConfig(String),
}

pub type Result<T> = std::result::Result<T, CallbackError>;
