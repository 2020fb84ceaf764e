use crate::error::{Result, TrainingError};
use callbacks::{
    Callback, CallbackError, DEFAULT_ROOT, EarlyStopping, ModelCheckpoint, PlotConfigBuilder,
    Plotter, RemoteMonitor,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration parameters for a training session.
///
/// Every field has a default, so a configuration file only needs to name the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Size of each training batch
    pub batch_size: usize,
    /// Number of training epochs
    pub epochs: usize,
    /// 0 is silent, 1 draws a progress bar, 2 prints a line per epoch
    pub verbose: u8,
    /// Whether accuracy is reported alongside loss
    pub show_accuracy: bool,
    /// Whether samples are shuffled at the start of every epoch
    pub shuffle: bool,
    /// Whether the model is evaluated on held-out data after every epoch
    pub validation: bool,
    /// Seed for shuffling and synthetic data; random when absent
    pub seed: Option<u64>,
    /// Learning rate for gradient descent
    pub learning_rate: f64,
    /// Number of synthetic training samples
    pub samples: usize,
    /// Number of input features per sample
    pub features: usize,
    pub checkpoint: Option<CheckpointConfig>,
    pub early_stopping: Option<EarlyStoppingConfig>,
    pub plot: Option<PlotSection>,
    pub remote: Option<RemoteConfig>,
    /// Where to write the recorded history once training ends
    pub history_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 20,
            verbose: 1,
            show_accuracy: true,
            shuffle: true,
            validation: true,
            seed: None,
            learning_rate: 0.05,
            samples: 1000,
            features: 3,
            checkpoint: None,
            early_stopping: None,
            plot: None,
            remote: None,
            history_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub filepath: PathBuf,
    #[serde(default)]
    pub save_best_only: bool,
    #[serde(default)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    #[serde(default)]
    pub patience: usize,
    #[serde(default)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSection {
    pub filepath: PathBuf,
    #[serde(default = "default_show_regressions")]
    pub show_regressions: bool,
}

fn default_show_regressions() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

impl TrainingConfig {
    /// Reads a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TrainingError::Config(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.features == 0 {
            return Err(TrainingError::Config("features must be positive".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::Config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Builds the callbacks named by the optional sections, in the order
    /// checkpoint, early stopping, plot, remote.
    pub fn callbacks(&self) -> Result<Vec<Box<dyn Callback>>> {
        let mut callbacks: Vec<Box<dyn Callback>> = Vec::new();

        if let Some(checkpoint) = &self.checkpoint {
            callbacks.push(Box::new(ModelCheckpoint::new(
                &checkpoint.filepath,
                checkpoint.verbose,
                checkpoint.save_best_only,
            )));
        }
        if let Some(early_stopping) = &self.early_stopping {
            callbacks.push(Box::new(EarlyStopping::new(
                early_stopping.patience,
                early_stopping.verbose,
            )));
        }
        if let Some(plot) = &self.plot {
            let config = PlotConfigBuilder::default()
                .show_regressions(plot.show_regressions)
                .build()
                .map_err(CallbackError::from)?;
            callbacks.push(Box::new(Plotter::new(&plot.filepath, config)));
        }
        if let Some(remote) = &self.remote {
            callbacks.push(Box::new(RemoteMonitor::new(&remote.root)));
        }
        Ok(callbacks)
    }
}
