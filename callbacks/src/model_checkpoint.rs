use crate::callback::Callback;
use crate::error::Result;
use crate::logs::{Logs, Params, keys};
use crate::model::{self, ModelHandle, WeakModel};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Saves the model weights at the end of every epoch, or only when the
/// validation loss improves.
///
/// Selecting the best model needs validation data; without it the callback
/// warns and saves nothing.
#[derive(Debug)]
pub struct ModelCheckpoint {
    filepath: PathBuf,
    verbose: u8,
    save_best_only: bool,
    params: Params,
    model: Option<WeakModel>,
    loss: Vec<f64>,
    best_loss: f64,
    val_loss: Vec<f64>,
    best_val_loss: f64,
}

impl ModelCheckpoint {
    pub fn new(filepath: impl Into<PathBuf>, verbose: u8, save_best_only: bool) -> Self {
        Self {
            filepath: filepath.into(),
            verbose,
            save_best_only,
            params: Params::default(),
            model: None,
            loss: Vec::new(),
            best_loss: f64::INFINITY,
            val_loss: Vec::new(),
            best_val_loss: f64::INFINITY,
        }
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// Lowest validation loss seen so far.
    pub fn best_val_loss(&self) -> f64 {
        self.best_val_loss
    }

    /// Lowest training loss seen so far when saving unconditionally.
    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Validation losses observed while selecting the best model.
    pub fn val_loss(&self) -> &[f64] {
        &self.val_loss
    }

    /// Training losses observed while saving unconditionally.
    pub fn loss(&self) -> &[f64] {
        &self.loss
    }

    fn save(&self) -> Result<()> {
        model::save_weights(self.model.as_ref(), &self.filepath, true)?;
        tracing::debug!(path = %self.filepath.display(), "Model weights saved");
        Ok(())
    }
}

impl Callback for ModelCheckpoint {
    fn set_params(&mut self, params: &Params) {
        self.params = params.clone();
    }

    fn set_model(&mut self, model: &ModelHandle) {
        self.model = Some(Rc::downgrade(model));
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        match (self.save_best_only, self.params.do_validation) {
            (true, true) => {
                let current = logs.require(keys::VAL_LOSS, "on_epoch_end")?;
                self.val_loss.push(current);
                if current < self.best_val_loss {
                    if self.verbose > 0 {
                        println!(
                            "Epoch {epoch:05}: validation loss improved from {:.5} to {current:.5}, saving model to {}",
                            self.best_val_loss,
                            self.filepath.display()
                        );
                    }
                    self.best_val_loss = current;
                    self.save()?;
                } else if self.verbose > 0 {
                    println!("Epoch {epoch:05}: validation loss did not improve");
                }
            }
            (true, false) => {
                tracing::warn!("Can save best model only with validation data, skipping");
            }
            (false, _) => {
                if self.verbose > 0 {
                    println!(
                        "Epoch {epoch:05}: saving model to {}",
                        self.filepath.display()
                    );
                }
                if let Some(current) = logs.get(keys::LOSS) {
                    self.loss.push(current);
                    self.best_loss = self.best_loss.min(current);
                }
                self.save()?;
            }
        }
        Ok(())
    }
}
