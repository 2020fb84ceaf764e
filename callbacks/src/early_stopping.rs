use crate::callback::Callback;
use crate::error::Result;
use crate::logs::{Logs, Params, keys};
use crate::model::{self, ModelHandle, WeakModel};
use std::rc::Rc;

/// Stops training once the validation loss has stopped improving.
///
/// `wait` counts consecutive epochs without a strictly lower validation loss.
/// The stop flag is raised when a non-improving epoch finds `wait` already at
/// `patience`, i.e. on the `patience + 1`-th non-improving epoch in a row.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    verbose: u8,
    params: Params,
    model: Option<WeakModel>,
    best_val_loss: f64,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, verbose: u8) -> Self {
        Self {
            patience,
            verbose,
            params: Params::default(),
            model: None,
            best_val_loss: f64::INFINITY,
            wait: 0,
        }
    }

    pub fn best_val_loss(&self) -> f64 {
        self.best_val_loss
    }

    pub fn wait(&self) -> usize {
        self.wait
    }
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Callback for EarlyStopping {
    fn set_params(&mut self, params: &Params) {
        self.params = params.clone();
    }

    fn set_model(&mut self, model: &ModelHandle) {
        self.model = Some(Rc::downgrade(model));
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        if !self.params.do_validation {
            tracing::warn!("Early stopping requires validation data!");
        }

        let Some(current) = logs.get(keys::VAL_LOSS) else {
            return Ok(());
        };

        if current < self.best_val_loss {
            self.best_val_loss = current;
            self.wait = 0;
        } else {
            if self.wait >= self.patience {
                if self.verbose > 0 {
                    println!("Epoch {epoch:05}: early stopping");
                }
                model::request_stop(self.model.as_ref())?;
                tracing::debug!(epoch, wait = self.wait, "Requested training stop");
            }
            self.wait += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::model::testing::RecordingModel;
    use std::cell::RefCell;

    fn attached(
        patience: usize,
        do_validation: bool,
    ) -> (EarlyStopping, Rc<RefCell<RecordingModel>>) {
        let mut early_stopping = EarlyStopping::new(patience, 0);
        let model = Rc::new(RefCell::new(RecordingModel::default()));
        let handle: ModelHandle = model.clone();
        early_stopping.set_params(&Params {
            do_validation,
            ..Params::default()
        });
        early_stopping.set_model(&handle);
        (early_stopping, model)
    }

    /// Feeds validation losses and returns the epoch at which the stop flag
    /// first went up.
    fn stopped_at(
        early_stopping: &mut EarlyStopping,
        model: &RefCell<RecordingModel>,
        losses: &[f64],
    ) -> Option<usize> {
        for (epoch, &val_loss) in losses.iter().enumerate() {
            early_stopping
                .on_epoch_end(epoch, &Logs::new().with(keys::VAL_LOSS, val_loss))
                .unwrap();
            if model.borrow().stop_training() {
                return Some(epoch);
            }
        }
        None
    }

    #[test]
    fn test_stops_after_patience_plus_one_flat_epochs() {
        let (mut early_stopping, model) = attached(2, true);
        let stopped = stopped_at(&mut early_stopping, &model, &[1.0, 1.0, 1.0, 1.0]);

        // The fourth call, epoch index 3, raises the flag.
        assert_eq!(stopped, Some(3));
    }

    #[test]
    fn test_improvement_resets_wait() {
        let (mut early_stopping, model) = attached(1, true);
        let stopped = stopped_at(&mut early_stopping, &model, &[1.0, 1.1, 0.9, 1.0]);

        assert_eq!(stopped, None);
        assert_eq!(early_stopping.wait(), 1);
        assert_eq!(early_stopping.best_val_loss(), 0.9);
    }

    #[test]
    fn test_zero_patience_stops_on_first_regression() {
        let (mut early_stopping, model) = attached(0, true);
        let stopped = stopped_at(&mut early_stopping, &model, &[1.0, 1.2]);
        assert_eq!(stopped, Some(1));
    }

    #[test]
    fn test_without_validation_still_compares_present_loss() {
        let (mut early_stopping, model) = attached(0, false);
        let stopped = stopped_at(&mut early_stopping, &model, &[1.0, 1.0]);
        assert_eq!(stopped, Some(1));
    }

    #[test]
    fn test_absent_validation_loss_is_skipped() {
        let (mut early_stopping, model) = attached(0, false);
        for epoch in 0..3 {
            early_stopping.on_epoch_end(epoch, &Logs::new()).unwrap();
        }
        assert!(!model.borrow().stop_training());
        assert_eq!(early_stopping.wait(), 0);
    }
}
