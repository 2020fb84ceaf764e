mod error;
mod linear_model;
mod training;
mod training_config;

pub use error::TrainingError;
pub use linear_model::{LinearModel, LinearWeights};
pub use training::{BatchMetrics, Trainable, Trainer};
pub use training_config::{
    CheckpointConfig, EarlyStoppingConfig, PlotSection, RemoteConfig, TrainingConfig,
};

pub mod prelude {
    pub use crate::LinearModel;
    pub use crate::Trainable;
    pub use crate::Trainer;
    pub use crate::TrainingConfig;
    pub use crate::TrainingError;
}
