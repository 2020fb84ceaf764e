use crate::callback::Callback;
use crate::error::Result;
use crate::history::History;
use crate::logs::{Logs, Params};
use crate::plot::{PlotConfig, PlotGenerator, PlotRenderer};
use std::path::PathBuf;

/// A [`History`] that redraws its curves after every epoch.
pub struct Plotter {
    history: History,
    renderer: Box<dyn PlotRenderer>,
}

impl Plotter {
    /// Plots into an SVG file at `filepath`.
    pub fn new(filepath: impl Into<PathBuf>, config: PlotConfig) -> Self {
        Self::with_renderer(PlotGenerator::new(filepath, config))
    }

    pub fn with_renderer(renderer: impl PlotRenderer + 'static) -> Self {
        Self {
            history: History::new(),
            renderer: Box::new(renderer),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}

impl Callback for Plotter {
    fn set_params(&mut self, params: &Params) {
        self.history.set_params(params);
    }

    fn on_train_begin(&mut self, logs: &Logs) -> Result<()> {
        self.history.on_train_begin(logs)
    }

    fn on_epoch_begin(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        self.history.on_epoch_begin(epoch, logs)
    }

    fn on_batch_end(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        self.history.on_batch_end(batch, logs)
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        self.history.on_epoch_end(epoch, logs)?;

        let params = self.history.params();
        let history = &self.history;
        let train_acc = if params.show_accuracy {
            history.accuracy()
        } else {
            &[]
        };
        let (val_loss, val_acc) = if params.do_validation {
            (history.validation_loss(), history.validation_accuracy())
        } else {
            (&[][..], &[][..])
        };

        self.renderer
            .update(epoch, history.loss(), train_acc, val_loss, val_acc)
    }
}
