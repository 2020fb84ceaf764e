use crate::accumulator::EpochAccumulator;
use crate::callback::Callback;
use crate::error::Result;
use crate::logs::{Logs, Params, keys};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-epoch training metrics recorded during training.
///
/// Series for metrics that are not tracked (accuracy without
/// `show_accuracy`, validation without `do_validation`) stay empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    #[serde(skip)]
    params: Params,
    #[serde(skip)]
    totals: EpochAccumulator,
    /// Index of each recorded epoch
    epoch: Vec<usize>,
    /// Weighted mean training loss for each epoch
    loss: Vec<f64>,
    /// Weighted mean training accuracy for each epoch
    accuracy: Vec<f64>,
    /// Validation loss for each epoch
    validation_loss: Vec<f64>,
    /// Validation accuracy for each epoch
    validation_accuracy: Vec<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> &[usize] {
        &self.epoch
    }

    pub fn loss(&self) -> &[f64] {
        &self.loss
    }

    pub fn accuracy(&self) -> &[f64] {
        &self.accuracy
    }

    pub fn validation_loss(&self) -> &[f64] {
        &self.validation_loss
    }

    pub fn validation_accuracy(&self) -> &[f64] {
        &self.validation_accuracy
    }

    pub(crate) fn params(&self) -> &Params {
        &self.params
    }

    /// Saves the recorded series to a file in JSON format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads previously saved series from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Callback for History {
    fn set_params(&mut self, params: &Params) {
        self.params = params.clone();
    }

    fn on_train_begin(&mut self, _logs: &Logs) -> Result<()> {
        self.epoch.clear();
        self.loss.clear();
        self.accuracy.clear();
        self.validation_loss.clear();
        self.validation_accuracy.clear();
        Ok(())
    }

    fn on_epoch_begin(&mut self, _epoch: usize, _logs: &Logs) -> Result<()> {
        self.totals.reset();
        Ok(())
    }

    fn on_batch_end(&mut self, _batch: usize, logs: &Logs) -> Result<()> {
        self.totals.record_logs(logs, self.params.show_accuracy);
        Ok(())
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        // Read validation values up front so a missing key leaves the
        // series aligned.
        let validation = if self.params.do_validation {
            let val_loss = logs.require(keys::VAL_LOSS, "on_epoch_end")?;
            let val_accuracy = if self.params.show_accuracy {
                Some(logs.require(keys::VAL_ACCURACY, "on_epoch_end")?)
            } else {
                None
            };
            Some((val_loss, val_accuracy))
        } else {
            None
        };

        self.epoch.push(epoch);
        self.loss.push(self.totals.loss());
        if self.params.show_accuracy {
            self.accuracy.push(self.totals.accuracy());
        }
        if let Some((val_loss, val_accuracy)) = validation {
            self.validation_loss.push(val_loss);
            self.validation_accuracy.extend(val_accuracy);
        }
        Ok(())
    }
}
