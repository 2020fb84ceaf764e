//! Fan-out dispatcher for training callbacks.
//!
//! The list forwards every lifecycle event to its callbacks in registration
//! order. Batch-level events are also timed: callbacks run on the training
//! loop's thread, so a slow one inflates training time directly. The list
//! keeps the last few dispatch durations per hook and warns when their median
//! rivals the batch update itself.
use crate::callback::Callback;
use crate::clock::{Clock, MonotonicClock};
use crate::error::Result;
use crate::logs::{Logs, Params};
use crate::model::ModelHandle;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Number of recent dispatch durations kept per batch hook.
pub const DEFAULT_QUEUE_LENGTH: usize = 10;

/// Fraction of the batch update a dispatch median must exceed to be slow.
const SLOW_RATIO: f64 = 0.95;

/// Dispatch medians at or below this are never reported.
const SLOW_FLOOR: Duration = Duration::from_millis(100);

/// The timed batch hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BatchBegin,
    BatchEnd,
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Hook::BatchBegin => "on_batch_begin",
            Hook::BatchEnd => "on_batch_end",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}()", self.name())
    }
}

/// A slow-callback warning raised by the list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowDispatch {
    /// The hook whose dispatch was slow
    pub hook: Hook,
    /// Median dispatch duration over the trailing window
    pub median: Duration,
    /// The batch update duration it was compared against
    pub batch: Duration,
}

/// Bounded window of recent durations.
#[derive(Debug, Clone)]
struct DurationWindow {
    capacity: usize,
    durations: VecDeque<Duration>,
}

impl DurationWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            durations: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, duration: Duration) {
        if self.capacity == 0 {
            return;
        }
        if self.durations.len() == self.capacity {
            self.durations.pop_front();
        }
        self.durations.push_back(duration);
    }

    fn clear(&mut self) {
        self.durations.clear();
    }

    /// Median of the window, averaging the two middle values when even.
    fn median(&self) -> Option<Duration> {
        let mut sorted: Vec<Duration> = self.durations.iter().copied().collect();
        sorted.sort_unstable();

        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            sorted.get(mid).copied()
        } else {
            let lower = sorted.get(mid.checked_sub(1)?)?;
            let upper = sorted.get(mid)?;
            Some((*lower + *upper) / 2)
        }
    }
}

/// Whether a dispatch median is pathologically slow next to the batch update.
fn is_slow(median: Duration, batch: Duration) -> bool {
    !batch.is_zero() && median.as_secs_f64() > SLOW_RATIO * batch.as_secs_f64() && median > SLOW_FLOOR
}

/// Ordered collection of callbacks dispatched as one.
///
/// # Example
///
/// ```
/// use callbacks::{CallbackList, History, Logs, Params, keys};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let history = Rc::new(RefCell::new(History::new()));
/// let mut list = CallbackList::new();
/// list.append(Rc::clone(&history));
///
/// list.set_params(&Params { nb_sample: 4, ..Params::default() });
/// list.on_train_begin(&Logs::new())?;
/// list.on_epoch_begin(0, &Logs::new())?;
/// list.on_batch_begin(0, &Logs::new())?;
/// list.on_batch_end(0, &Logs::new().with(keys::SIZE, 4.0).with(keys::LOSS, 0.5))?;
/// list.on_epoch_end(0, &Logs::new())?;
///
/// assert_eq!(history.borrow().loss(), &[0.5]);
/// # Ok::<(), callbacks::CallbackError>(())
/// ```
pub struct CallbackList {
    callbacks: Vec<Box<dyn Callback>>,
    clock: Box<dyn Clock>,
    last_batch_duration: Duration,
    entered_batch_at: Option<Duration>,
    batch_begin_window: DurationWindow,
    batch_end_window: DurationWindow,
    slow_dispatches: Vec<SlowDispatch>,
}

impl CallbackList {
    pub fn new() -> Self {
        Self::with_queue_length(DEFAULT_QUEUE_LENGTH)
    }

    /// Creates an empty list keeping `queue_length` durations per batch hook.
    pub fn with_queue_length(queue_length: usize) -> Self {
        Self {
            callbacks: Vec::new(),
            clock: Box::new(MonotonicClock::new()),
            last_batch_duration: Duration::ZERO,
            entered_batch_at: None,
            batch_begin_window: DurationWindow::new(queue_length),
            batch_end_window: DurationWindow::new(queue_length),
            slow_dispatches: Vec::new(),
        }
    }

    /// Replaces the time source used to time batch dispatch.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Adds a callback after all those already registered.
    pub fn append<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Slow-callback warnings raised since training began.
    pub fn slow_dispatches(&self) -> &[SlowDispatch] {
        &self.slow_dispatches
    }

    pub fn set_params(&mut self, params: &Params) {
        for callback in &mut self.callbacks {
            callback.set_params(params);
        }
    }

    pub fn set_model(&mut self, model: &ModelHandle) {
        for callback in &mut self.callbacks {
            callback.set_model(model);
        }
    }

    fn dispatch<F>(&mut self, mut hook: F) -> Result<()>
    where
        F: FnMut(&mut dyn Callback) -> Result<()>,
    {
        for callback in &mut self.callbacks {
            hook(callback.as_mut())?;
        }
        Ok(())
    }

    /// Dispatches the event and forgets warnings from any earlier run.
    pub fn on_train_begin(&mut self, logs: &Logs) -> Result<()> {
        self.slow_dispatches.clear();
        self.dispatch(|callback| callback.on_train_begin(logs))
    }

    pub fn on_train_end(&mut self, logs: &Logs) -> Result<()> {
        self.dispatch(|callback| callback.on_train_end(logs))
    }

    /// Dispatches the event, then starts fresh timing windows for the epoch.
    pub fn on_epoch_begin(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        self.dispatch(|callback| callback.on_epoch_begin(epoch, logs))?;
        self.last_batch_duration = Duration::ZERO;
        self.batch_begin_window.clear();
        self.batch_end_window.clear();
        Ok(())
    }

    pub fn on_epoch_end(&mut self, epoch: usize, logs: &Logs) -> Result<()> {
        self.dispatch(|callback| callback.on_epoch_end(epoch, logs))
    }

    /// Dispatches the event and checks its timing against the previous batch
    /// update. The batch update is considered to start when this returns.
    pub fn on_batch_begin(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        let started = self.clock.now();
        self.dispatch(|callback| callback.on_batch_begin(batch, logs))?;
        let elapsed = self.clock.now().saturating_sub(started);

        self.batch_begin_window.push(elapsed);
        self.check_slow(Hook::BatchBegin);
        self.entered_batch_at = Some(self.clock.now());
        Ok(())
    }

    /// Measures the batch update that just finished, then dispatches the
    /// event and checks its timing against that update.
    pub fn on_batch_end(&mut self, batch: usize, logs: &Logs) -> Result<()> {
        self.last_batch_duration = self
            .entered_batch_at
            .map(|entered| self.clock.now().saturating_sub(entered))
            .unwrap_or_default();

        let started = self.clock.now();
        self.dispatch(|callback| callback.on_batch_end(batch, logs))?;
        let elapsed = self.clock.now().saturating_sub(started);

        self.batch_end_window.push(elapsed);
        self.check_slow(Hook::BatchEnd);
        Ok(())
    }

    fn check_slow(&mut self, hook: Hook) {
        let window = match hook {
            Hook::BatchBegin => &self.batch_begin_window,
            Hook::BatchEnd => &self.batch_end_window,
        };
        let Some(median) = window.median() else {
            return;
        };

        if is_slow(median, self.last_batch_duration) {
            tracing::warn!(
                "Method {hook} is slow compared to the batch update ({:.6}s). Check your callbacks.",
                median.as_secs_f64()
            );
            self.slow_dispatches.push(SlowDispatch {
                hook,
                median,
                batch: self.last_batch_duration,
            });
        }
    }
}

impl Default for CallbackList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("callbacks", &self.callbacks.len())
            .field("last_batch_duration", &self.last_batch_duration)
            .field("slow_dispatches", &self.slow_dispatches.len())
            .finish()
    }
}

impl FromIterator<Box<dyn Callback>> for CallbackList {
    fn from_iter<I: IntoIterator<Item = Box<dyn Callback>>>(iter: I) -> Self {
        let mut list = Self::new();
        list.callbacks.extend(iter);
        list
    }
}

impl Extend<Box<dyn Callback>> for CallbackList {
    fn extend<I: IntoIterator<Item = Box<dyn Callback>>>(&mut self, iter: I) {
        self.callbacks.extend(iter);
    }
}
