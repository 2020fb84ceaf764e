//! Console reporting of running loss and accuracy.
use crate::accumulator::EpochAccumulator;
use crate::callback::Callback;
use crate::error::Result;
use crate::logs::{Logs, Params, keys};
use crate::progress::{Progbar, ProgressDisplay};

/// Builds the display for an epoch from its sample target and verbosity.
pub type DisplayFactory = Box<dyn FnMut(usize, u8) -> Box<dyn ProgressDisplay>>;

/// Reports the running, batch-size weighted loss (and accuracy when tracked)
/// on a progress display.
///
/// The display is refreshed after every batch except the one that completes
/// the epoch; that batch's numbers are folded into the epoch-end update,
/// which shows the epoch averages and, when validation is enabled, the
/// validation metrics.
pub struct BaseLogger {
    params: Params,
    verbose: u8,
    display_factory: DisplayFactory,
    display: Option<Box<dyn ProgressDisplay>>,
    totals: EpochAccumulator,
    log_values: Vec<(&'static str, f64)>,
}

impl BaseLogger {
    pub fn new() -> Self {
        Self::with_display(|target, verbose| Box::new(Progbar::new(target, verbose)))
    }

    /// Creates a logger drawing on displays produced by `factory`.
    pub fn with_display<F>(factory: F) -> Self
    where
        F: FnMut(usize, u8) -> Box<dyn ProgressDisplay> + 'static,
    {
        Self {
            params: Params::default(),
            verbose: 0,
            display_factory: Box::new(factory),
            display: None,
            totals: EpochAccumulator::new(),
            log_values: Vec::new(),
        }
    }

    fn refresh(&mut self) {
        if let Some(display) = self.display.as_mut() {
            display.update(self.totals.seen(), &self.log_values);
        }
    }
}

impl Default for BaseLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Callback for BaseLogger {
    fn set_params(&mut self, params: &Params) {
        self.params = params.clone();
    }

    fn on_train_begin(&mut self, _logs: &Logs) -> Result<()> {
        self.verbose = self.params.verbose;
        Ok(())
    }

    fn on_epoch_begin(&mut self, epoch: usize, _logs: &Logs) -> Result<()> {
        if self.verbose > 0 {
            println!("Epoch {epoch}");
            self.display = Some((self.display_factory)(self.params.nb_sample, self.verbose));
        }
        self.totals.reset();
        self.log_values.clear();
        Ok(())
    }

    fn on_batch_begin(&mut self, _batch: usize, _logs: &Logs) -> Result<()> {
        if self.totals.seen() < self.params.nb_sample {
            self.log_values.clear();
        }
        Ok(())
    }

    fn on_batch_end(&mut self, _batch: usize, logs: &Logs) -> Result<()> {
        let loss = logs.require(keys::LOSS, "on_batch_end")?;
        self.log_values.push(("loss", loss));

        let accuracy = if self.params.show_accuracy {
            let accuracy = logs.require(keys::ACCURACY, "on_batch_end")?;
            self.log_values.push(("acc.", accuracy));
            Some(accuracy)
        } else {
            None
        };
        self.totals.record(logs.size(), loss, accuracy);

        // The batch completing the epoch is reported by on_epoch_end.
        if self.verbose > 0 && self.totals.seen() < self.params.nb_sample {
            self.refresh();
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, _epoch: usize, logs: &Logs) -> Result<()> {
        let mut values = vec![("loss", self.totals.loss())];
        if self.params.show_accuracy {
            values.push(("acc.", self.totals.accuracy()));
        }
        if self.params.do_validation {
            values.push(("val. loss", logs.require(keys::VAL_LOSS, "on_epoch_end")?));
            if self.params.show_accuracy {
                values.push((
                    "val. acc.",
                    logs.require(keys::VAL_ACCURACY, "on_epoch_end")?,
                ));
            }
        }
        self.log_values = values;
        self.refresh();
        Ok(())
    }
}
