//! The reference training loop.
//!
//! `Trainer` owns no model state of its own: it slices the samples into
//! batches, asks the model to learn from each one and reports every step to
//! the registered callbacks. Logging, checkpointing and early stopping all
//! happen in callbacks.

use crate::error::{Result, TrainingError};
use crate::training_config::TrainingConfig;
use callbacks::{BaseLogger, Callback, CallbackList, History, Logs, Model, ModelHandle, Params, keys};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::cell::RefCell;
use std::rc::Rc;

/// Loss and accuracy measured on one batch or on the validation set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchMetrics {
    pub loss: f64,
    pub accuracy: Option<f64>,
}

/// A model the reference loop can train.
pub trait Trainable: Model {
    /// Updates the model on the samples at `indices`.
    fn train_batch(&mut self, indices: &[usize]) -> anyhow::Result<BatchMetrics>;

    /// Measures the model on held-out data.
    fn evaluate(&self) -> anyhow::Result<BatchMetrics>;
}

/// Runs training epochs and dispatches lifecycle events to callbacks.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Trains `model` on `nb_sample` samples and returns the recorded history.
    ///
    /// A [`BaseLogger`] is placed before `callbacks` when the configuration is
    /// verbose, and a [`History`] after them. Training ends early once any
    /// callback raises the model's stop flag.
    pub fn fit<M>(
        &self,
        model: &Rc<RefCell<M>>,
        nb_sample: usize,
        callbacks: Vec<Box<dyn Callback>>,
    ) -> Result<History>
    where
        M: Trainable + 'static,
    {
        self.config.validate()?;

        let history = Rc::new(RefCell::new(History::new()));
        let mut list = CallbackList::new();
        if self.config.verbose > 0 {
            list.append(BaseLogger::new());
        }
        list.extend(callbacks);
        list.append(Rc::clone(&history));

        let handle: ModelHandle = model.clone();
        list.set_params(&Params {
            verbose: self.config.verbose,
            nb_sample,
            show_accuracy: self.config.show_accuracy,
            do_validation: self.config.validation,
        });
        list.set_model(&handle);
        borrow_mut(model)?.set_stop_training(false);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut indices: Vec<usize> = (0..nb_sample).collect();

        tracing::info!(
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            nb_sample,
            "Starting training"
        );
        list.on_train_begin(&Logs::new())?;

        for epoch in 0..self.config.epochs {
            list.on_epoch_begin(epoch, &Logs::new())?;
            if self.config.shuffle {
                indices.shuffle(&mut rng);
            }

            for (batch, batch_indices) in indices.chunks(self.config.batch_size).enumerate() {
                let mut logs = Logs::new()
                    .with(keys::BATCH, batch as f64)
                    .with(keys::SIZE, batch_indices.len() as f64);
                list.on_batch_begin(batch, &logs)?;

                let metrics = borrow_mut(model)?.train_batch(batch_indices)?;
                logs.insert(keys::LOSS, metrics.loss);
                if let Some(accuracy) = metrics.accuracy.filter(|_| self.config.show_accuracy) {
                    logs.insert(keys::ACCURACY, accuracy);
                }
                list.on_batch_end(batch, &logs)?;
            }

            let mut epoch_logs = Logs::new();
            if self.config.validation {
                let metrics = borrow(model)?.evaluate()?;
                epoch_logs.insert(keys::VAL_LOSS, metrics.loss);
                if let Some(accuracy) = metrics.accuracy.filter(|_| self.config.show_accuracy) {
                    epoch_logs.insert(keys::VAL_ACCURACY, accuracy);
                }
            }
            list.on_epoch_end(epoch, &epoch_logs)?;

            if borrow(model)?.stop_training() {
                tracing::info!(epoch, "Training stopped early");
                break;
            }
        }

        list.on_train_end(&Logs::new())?;
        drop(list);

        let history = Rc::try_unwrap(history)
            .map(RefCell::into_inner)
            .unwrap_or_else(|shared| shared.borrow().clone());
        Ok(history)
    }
}

fn borrow<M>(model: &RefCell<M>) -> Result<std::cell::Ref<'_, M>> {
    model
        .try_borrow()
        .map_err(|e| TrainingError::ModelBusy(e.to_string()))
}

fn borrow_mut<M>(model: &RefCell<M>) -> Result<std::cell::RefMut<'_, M>> {
    model
        .try_borrow_mut()
        .map_err(|e| TrainingError::ModelBusy(e.to_string()))
}
