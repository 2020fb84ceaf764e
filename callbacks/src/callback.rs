//! The lifecycle hooks every training observer implements.
use crate::error::Result;
use crate::logs::{Logs, Params};
use crate::model::ModelHandle;
use std::cell::RefCell;
use std::rc::Rc;

/// Observer of the training loop.
///
/// Every hook defaults to a no-op, so implementors override only the events
/// they care about. Hooks run synchronously on the training loop's thread and
/// an error returned from any of them stops the training loop.
///
/// `set_params` and `set_model` are called once before training starts.
/// Implementors keep whatever part of them they need; a callback should hold
/// the model through [`Rc::downgrade`] rather than owning it.
///
/// # Example
///
/// ```
/// use callbacks::{Callback, CallbackError, Logs, keys};
///
/// #[derive(Default)]
/// struct LossPrinter;
///
/// impl Callback for LossPrinter {
///     fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<(), CallbackError> {
///         println!("epoch {epoch}: {:?}", logs.get(keys::LOSS));
///         Ok(())
///     }
/// }
/// ```
pub trait Callback {
    fn set_params(&mut self, _params: &Params) {}

    fn set_model(&mut self, _model: &ModelHandle) {}

    fn on_train_begin(&mut self, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_train_end(&mut self, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _epoch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, _epoch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_batch_begin(&mut self, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_batch_end(&mut self, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }
}

/// A shared callback is dispatched through its cell, letting the caller keep
/// a handle and inspect its state once training is done.
impl<C: Callback + ?Sized> Callback for Rc<RefCell<C>> {
    fn set_params(&mut self, params: &Params) {
        self.borrow_mut().set_params(params);
    }

    fn set_model(&mut self, model: &ModelHandle) {
        self.borrow_mut().set_model(model);
    }

    fn on_train_begin(&mut self, logs: &Logs) -> Result<()> {
        self.borrow_mut().on_train_begin(logs)
    }

    fn on_train_end(&mut self, logs: &Logs) -> Result<()> {
        self.borrow_mut().on_train_end(logs)
    }

    fn on_epoch_begin(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        self.borrow_mut().on_epoch_begin(epoch, logs)
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        self.borrow_mut().on_epoch_end(epoch, logs)
    }

    fn on_batch_begin(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        self.borrow_mut().on_batch_begin(batch, logs)
    }

    fn on_batch_end(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        self.borrow_mut().on_batch_end(batch, logs)
    }
}

impl<C: Callback + ?Sized> Callback for Box<C> {
    fn set_params(&mut self, params: &Params) {
        (**self).set_params(params);
    }

    fn set_model(&mut self, model: &ModelHandle) {
        (**self).set_model(model);
    }

    fn on_train_begin(&mut self, logs: &Logs) -> Result<()> {
        (**self).on_train_begin(logs)
    }

    fn on_train_end(&mut self, logs: &Logs) -> Result<()> {
        (**self).on_train_end(logs)
    }

    fn on_epoch_begin(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        (**self).on_epoch_begin(epoch, logs)
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        (**self).on_epoch_end(epoch, logs)
    }

    fn on_batch_begin(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        (**self).on_batch_begin(batch, logs)
    }

    fn on_batch_end(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        (**self).on_batch_end(batch, logs)
    }
}
