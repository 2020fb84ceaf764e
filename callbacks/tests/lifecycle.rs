use callbacks::prelude::*;
use callbacks::{Hook, ManualClock, keys};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tempfile::tempdir;

/// Writes a one-line weights file and honours the stop flag.
#[derive(Default)]
struct FileModel {
    stop: bool,
}

impl Model for FileModel {
    fn save_weights(&self, path: &Path, overwrite: bool) -> anyhow::Result<()> {
        if path.exists() && !overwrite {
            anyhow::bail!("{} already exists", path.display());
        }
        fs::write(path, "weights")?;
        Ok(())
    }

    fn stop_training(&self) -> bool {
        self.stop
    }

    fn set_stop_training(&mut self, stop: bool) {
        self.stop = stop;
    }
}

type Events = Rc<RefCell<Vec<String>>>;

/// Records every event it sees under its own name.
struct Tracer {
    name: &'static str,
    events: Events,
}

impl Tracer {
    fn log(&self, event: String) {
        self.events.borrow_mut().push(format!("{}:{event}", self.name));
    }
}

impl Callback for Tracer {
    fn on_train_begin(&mut self, _logs: &Logs) -> Result<(), CallbackError> {
        self.log("train_begin".into());
        Ok(())
    }

    fn on_train_end(&mut self, _logs: &Logs) -> Result<(), CallbackError> {
        self.log("train_end".into());
        Ok(())
    }

    fn on_epoch_begin(&mut self, epoch: usize, _logs: &Logs) -> Result<(), CallbackError> {
        self.log(format!("epoch_begin({epoch})"));
        Ok(())
    }

    fn on_epoch_end(&mut self, epoch: usize, _logs: &Logs) -> Result<(), CallbackError> {
        self.log(format!("epoch_end({epoch})"));
        Ok(())
    }

    fn on_batch_begin(&mut self, batch: usize, _logs: &Logs) -> Result<(), CallbackError> {
        self.log(format!("batch_begin({batch})"));
        Ok(())
    }

    fn on_batch_end(&mut self, batch: usize, _logs: &Logs) -> Result<(), CallbackError> {
        self.log(format!("batch_end({batch})"));
        Ok(())
    }
}

/// Drives `list` the way a training loop does: two batches of two samples per
/// epoch, validation losses taken from `val_losses`, stopping when the model
/// asks to. Returns the number of epochs run.
fn drive(list: &mut CallbackList, model: &Rc<RefCell<FileModel>>, val_losses: &[f64]) -> usize {
    let handle: ModelHandle = model.clone();
    list.set_params(&Params {
        verbose: 0,
        nb_sample: 4,
        show_accuracy: false,
        do_validation: true,
    });
    list.set_model(&handle);

    list.on_train_begin(&Logs::new()).unwrap();
    let mut epochs = 0;
    for (epoch, &val_loss) in val_losses.iter().enumerate() {
        list.on_epoch_begin(epoch, &Logs::new()).unwrap();
        for batch in 0..2 {
            let begin = Logs::new()
                .with(keys::BATCH, batch as f64)
                .with(keys::SIZE, 2.0);
            list.on_batch_begin(batch, &begin).unwrap();
            let end = begin.clone().with(keys::LOSS, 1.0 / (epoch + 1) as f64);
            list.on_batch_end(batch, &end).unwrap();
        }
        list.on_epoch_end(epoch, &Logs::new().with(keys::VAL_LOSS, val_loss))
            .unwrap();
        epochs += 1;
        if model.borrow().stop_training() {
            break;
        }
    }
    list.on_train_end(&Logs::new()).unwrap();
    epochs
}

#[test]
fn test_events_reach_callbacks_in_registration_order() {
    let events = Events::default();
    let mut list = CallbackList::new();
    for name in ["first", "second"] {
        list.append(Tracer {
            name,
            events: Rc::clone(&events),
        });
    }

    let model = Rc::new(RefCell::new(FileModel::default()));
    drive(&mut list, &model, &[1.0]);

    let expected: Vec<String> = [
        "train_begin",
        "epoch_begin(0)",
        "batch_begin(0)",
        "batch_end(0)",
        "batch_begin(1)",
        "batch_end(1)",
        "epoch_end(0)",
        "train_end",
    ]
    .iter()
    .flat_map(|event| [format!("first:{event}"), format!("second:{event}")])
    .collect();
    assert_eq!(*events.borrow(), expected);
}

#[test]
fn test_history_early_stopping_and_checkpoint_together() {
    let dir = tempdir().unwrap();
    let weights = dir.path().join("best.weights");

    let history = Rc::new(RefCell::new(History::new()));
    let checkpoint = Rc::new(RefCell::new(ModelCheckpoint::new(&weights, 0, true)));
    let mut list = CallbackList::new();
    list.append(Rc::clone(&history));
    list.append(EarlyStopping::new(1, 0));
    list.append(Rc::clone(&checkpoint));

    let model = Rc::new(RefCell::new(FileModel::default()));
    let epochs = drive(&mut list, &model, &[0.8, 0.6, 0.7, 0.65, 0.9]);

    // Epoch 3 is the second epoch in a row without improvement.
    assert_eq!(epochs, 4);
    assert!(model.borrow().stop_training());

    let history = history.borrow();
    assert_eq!(history.epoch(), &[0, 1, 2, 3]);
    assert_eq!(history.loss(), &[1.0, 0.5, 1.0 / 3.0, 0.25]);
    assert_eq!(history.validation_loss(), &[0.8, 0.6, 0.7, 0.65]);
    assert!(history.accuracy().is_empty());

    assert_eq!(checkpoint.borrow().best_val_loss(), 0.6);
    assert!(weights.exists());
}

#[test]
fn test_saved_history_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.json");

    let history = Rc::new(RefCell::new(History::new()));
    let mut list = CallbackList::new();
    list.append(Rc::clone(&history));
    let model = Rc::new(RefCell::new(FileModel::default()));
    drive(&mut list, &model, &[0.5, 0.4]);

    history.borrow().save(&path).unwrap();
    let restored = History::load(&path).unwrap();
    assert_eq!(restored.loss(), history.borrow().loss());
    assert_eq!(restored.validation_loss(), &[0.5, 0.4]);
}

/// Burns time on the shared clock whenever a batch ends.
struct Sluggish {
    clock: ManualClock,
    cost: Rc<Cell<Duration>>,
}

impl Callback for Sluggish {
    fn on_batch_end(&mut self, _batch: usize, _logs: &Logs) -> Result<(), CallbackError> {
        self.clock.advance(self.cost.get());
        Ok(())
    }
}

/// A default-sized list holding one `Sluggish` whose cost can be changed.
fn sluggish_list(cost: Duration) -> (CallbackList, ManualClock, Rc<Cell<Duration>>) {
    let clock = ManualClock::default();
    let cost = Rc::new(Cell::new(cost));
    let mut list = CallbackList::new().with_clock(clock.clone());
    list.append(Sluggish {
        clock: clock.clone(),
        cost: Rc::clone(&cost),
    });
    (list, clock, cost)
}

fn run_batch(list: &mut CallbackList, clock: &ManualClock, batch: usize, update: Duration) {
    list.on_batch_begin(batch, &Logs::new()).unwrap();
    clock.advance(update);
    list.on_batch_end(batch, &Logs::new()).unwrap();
}

#[test]
fn test_slow_batch_end_is_reported() {
    let (mut list, clock, _cost) = sluggish_list(Duration::from_millis(300));

    list.on_epoch_begin(0, &Logs::new()).unwrap();
    for batch in 0..3 {
        run_batch(&mut list, &clock, batch, Duration::from_millis(200));
    }

    let slow = list.slow_dispatches();
    assert_eq!(slow.len(), 3);
    assert!(slow.iter().all(|dispatch| dispatch.hook == Hook::BatchEnd));
    assert_eq!(slow[0].median, Duration::from_millis(300));
    assert_eq!(slow[0].batch, Duration::from_millis(200));
}

#[test]
fn test_fast_callbacks_are_not_reported() {
    let (mut list, clock, _cost) = sluggish_list(Duration::from_millis(50));

    list.on_epoch_begin(0, &Logs::new()).unwrap();
    for batch in 0..5 {
        run_batch(&mut list, &clock, batch, Duration::from_millis(10));
    }

    // Slower than the batch, but under the reporting floor.
    assert!(list.slow_dispatches().is_empty());
}

#[test]
fn test_old_durations_leave_the_median_window() {
    let (mut list, clock, cost) = sluggish_list(Duration::from_millis(300));
    let batch_update = Duration::from_millis(200);

    list.on_epoch_begin(0, &Logs::new()).unwrap();
    for batch in 0..12 {
        run_batch(&mut list, &clock, batch, batch_update);
    }
    assert_eq!(list.slow_dispatches().len(), 12);

    // The window holds the last 10 dispatches. While at least six of them
    // are slow the median stays at 300ms. The fifth fast dispatch makes the
    // two middle values 10ms and 300ms, and their mean is under 0.95 × 200ms.
    cost.set(Duration::from_millis(10));
    let mut reported = Vec::new();
    for batch in 12..24 {
        run_batch(&mut list, &clock, batch, batch_update);
        reported.push(list.slow_dispatches().len());
    }
    assert_eq!(reported, [13, 14, 15, 16, 16, 16, 16, 16, 16, 16, 16, 16]);
    assert_eq!(
        list.slow_dispatches().last().map(|dispatch| dispatch.median),
        Some(Duration::from_millis(300))
    );
}

#[test]
fn test_median_must_exceed_the_batch_ratio() {
    let batch_update = Duration::from_secs(1);

    let (mut list, clock, _cost) = sluggish_list(Duration::from_millis(950));
    list.on_epoch_begin(0, &Logs::new()).unwrap();
    for batch in 0..12 {
        run_batch(&mut list, &clock, batch, batch_update);
    }
    assert!(list.slow_dispatches().is_empty());

    let (mut list, clock, _cost) = sluggish_list(Duration::from_millis(951));
    list.on_epoch_begin(0, &Logs::new()).unwrap();
    for batch in 0..12 {
        run_batch(&mut list, &clock, batch, batch_update);
    }
    assert_eq!(list.slow_dispatches().len(), 12);
}
