//! The model collaborator as seen from callbacks.
//!
//! Callbacks never own the model. The training loop keeps a [`ModelHandle`]
//! and hands callbacks a weak reference through `set_model`.
use crate::error::{CallbackError, Result};
use std::cell::RefCell;
use std::path::Path;
use std::rc::{Rc, Weak};

/// Capabilities a model exposes to callbacks.
pub trait Model {
    /// Persists the model weights to `path`.
    ///
    /// When `overwrite` is false an existing file must be left untouched.
    fn save_weights(&self, path: &Path, overwrite: bool) -> anyhow::Result<()>;

    /// Whether the training loop has been asked to stop.
    fn stop_training(&self) -> bool;

    /// Asks the training loop to stop after the current epoch.
    fn set_stop_training(&mut self, stop: bool);
}

/// Shared, single-threaded handle to a model.
pub type ModelHandle = Rc<RefCell<dyn Model>>;

/// Back reference held by callbacks.
pub type WeakModel = Weak<RefCell<dyn Model>>;

/// Resolves a stored back reference, failing when it was never set or the
/// model has since been dropped.
pub(crate) fn upgrade(model: Option<&WeakModel>) -> Result<ModelHandle> {
    model
        .and_then(Weak::upgrade)
        .ok_or(CallbackError::ModelUnavailable)
}

pub(crate) fn save_weights(model: Option<&WeakModel>, path: &Path, overwrite: bool) -> Result<()> {
    let model = upgrade(model)?;
    let model = model
        .try_borrow()
        .map_err(|e| CallbackError::ModelBusy(e.to_string()))?;
    model.save_weights(path, overwrite)?;
    Ok(())
}

pub(crate) fn request_stop(model: Option<&WeakModel>) -> Result<()> {
    let model = upgrade(model)?;
    let mut model = model
        .try_borrow_mut()
        .map_err(|e| CallbackError::ModelBusy(e.to_string()))?;
    model.set_stop_training(true);
    Ok(())
}
