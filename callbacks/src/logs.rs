//! Values exchanged between the training loop and its callbacks.
//!
//! [`Logs`] carries the per-event metrics (loss, batch size, validation
//! scores, ...) and [`Params`] the training configuration that callbacks are
//! allowed to see.
use crate::error::{CallbackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known log keys.
pub mod keys {
    pub const LOSS: &str = "loss";
    pub const SIZE: &str = "size";
    pub const ACCURACY: &str = "accuracy";
    pub const VAL_LOSS: &str = "val_loss";
    pub const VAL_ACCURACY: &str = "val_accuracy";
    pub const EPOCH: &str = "epoch";
    pub const BATCH: &str = "batch";
}

/// Numeric metrics reported by the training loop for a single event.
///
/// Which keys are present depends on the training configuration: `val_loss`
/// only appears when validation is enabled, `accuracy` only when accuracy is
/// tracked, and so on.
///
/// # Example
///
/// ```
/// use callbacks::{Logs, keys};
///
/// let logs = Logs::new().with(keys::LOSS, 0.25).with(keys::SIZE, 32.0);
/// assert_eq!(logs.get(keys::LOSS), Some(0.25));
/// assert_eq!(logs.size(), 32);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Logs(BTreeMap<String, f64>);

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the logs with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// Looks up a key the calling hook cannot do without.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::MissingLog`] naming the key and the hook.
    pub fn require(&self, key: &'static str, hook: &'static str) -> Result<f64> {
        self.get(key).ok_or(CallbackError::MissingLog { key, hook })
    }

    /// Number of samples in the batch, zero when not reported.
    pub fn size(&self) -> usize {
        let size = self.get_or(keys::SIZE, 0.0);
        if size.is_finite() && size > 0.0 {
            size as usize
        } else {
            0
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Logs {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Training configuration visible to callbacks.
///
/// Set once through [`crate::Callback::set_params`] before training begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Verbosity level, 0 is silent
    pub verbose: u8,
    /// Total number of samples per epoch
    pub nb_sample: usize,
    /// Whether the training loop reports accuracy
    pub show_accuracy: bool,
    /// Whether the training loop reports validation metrics
    pub do_validation: bool,
}
