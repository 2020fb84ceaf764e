use callbacks::CallbackError;
use thiserror::Error;

/// Errors raised while configuring or running a training session.
#[derive(Error, Debug)]
pub enum TrainingError {
    /// A callback hook failed
    #[error(transparent)]
    Callback(#[from] CallbackError),
    /// The model failed to train or evaluate
    #[error("Model error: {0}")]
    Model(#[from] anyhow::Error),
    /// The model was borrowed elsewhere when the loop needed it
    #[error("Model is busy: {0}")]
    ModelBusy(String),
    /// The training configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Wrapper for standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrainingError>;
