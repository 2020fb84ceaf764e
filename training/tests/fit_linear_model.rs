use callbacks::{Callback, EarlyStopping, History, Model, PlotConfig, Plotter};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::tempdir;
use training::{CheckpointConfig, LinearModel, LinearWeights, Trainer, TrainingConfig};

fn config(epochs: usize) -> TrainingConfig {
    TrainingConfig {
        batch_size: 16,
        epochs,
        verbose: 0,
        seed: Some(42),
        learning_rate: 0.1,
        samples: 400,
        features: 2,
        ..TrainingConfig::default()
    }
}

fn model_for(config: &TrainingConfig) -> Rc<RefCell<LinearModel>> {
    Rc::new(RefCell::new(LinearModel::synthetic(
        config.samples,
        config.features,
        config.learning_rate,
        config.seed,
    )))
}

#[test]
fn test_fit_reduces_loss_and_records_history() {
    let config = config(10);
    let model = model_for(&config);
    let nb_sample = model.borrow().nb_sample();

    let history = Trainer::new(config).fit(&model, nb_sample, Vec::new()).unwrap();

    assert_eq!(history.epoch().len(), 10);
    let losses = history.loss();
    assert!(losses[9] < losses[0] / 10.0, "losses: {losses:?}");
    assert_eq!(history.validation_loss().len(), 10);
    assert!(history.validation_accuracy()[9] > 0.9);
}

#[test]
fn test_checkpoint_writes_best_weights() {
    let dir = tempdir().unwrap();
    let weights_path = dir.path().join("best.json");
    let config = TrainingConfig {
        checkpoint: Some(CheckpointConfig {
            filepath: weights_path.clone(),
            save_best_only: true,
            verbose: 0,
        }),
        ..config(5)
    };
    let model = model_for(&config);
    let nb_sample = model.borrow().nb_sample();
    let callbacks = config.callbacks().unwrap();

    let history = Trainer::new(config).fit(&model, nb_sample, callbacks).unwrap();

    let saved: LinearWeights =
        serde_json::from_str(&fs::read_to_string(&weights_path).unwrap()).unwrap();
    assert_eq!(saved.weights.len(), 2);
    assert_eq!(history.epoch().len(), 5);
}

#[test]
fn test_early_stopping_ends_a_plateaued_run() {
    // Once the fit reaches the noise floor, mini-batch updates make the
    // validation loss jitter, so zero patience stops well before the limit.
    let config = config(200);
    let model = model_for(&config);
    let nb_sample = model.borrow().nb_sample();
    let early_stopping = Rc::new(RefCell::new(EarlyStopping::new(0, 0)));
    let callbacks: Vec<Box<dyn Callback>> = vec![Box::new(Rc::clone(&early_stopping))];

    let history = Trainer::new(config).fit(&model, nb_sample, callbacks).unwrap();

    let val_loss = history.validation_loss();
    assert!(model.borrow().stop_training());
    assert!(val_loss.len() < 200);

    let (last, before) = val_loss.split_last().unwrap();
    let best_before = before.iter().copied().fold(f64::INFINITY, f64::min);
    assert!(*last >= best_before);
    assert_eq!(early_stopping.borrow().best_val_loss(), best_before);
    assert_eq!(early_stopping.borrow().wait(), 1);
}

#[test]
fn test_history_and_plot_files() {
    let dir = tempdir().unwrap();
    let plot_path = dir.path().join("curves.svg");
    let history_path = dir.path().join("history.json");

    let config = config(3);
    let model = model_for(&config);
    let nb_sample = model.borrow().nb_sample();
    let plotter = Plotter::new(&plot_path, PlotConfig::default());

    let history = Trainer::new(config)
        .fit(&model, nb_sample, vec![Box::new(plotter)])
        .unwrap();
    history.save(&history_path).unwrap();

    assert!(fs::read_to_string(&plot_path).unwrap().contains("<svg"));
    let restored = History::load(&history_path).unwrap();
    assert_eq!(restored.loss(), history.loss());
}
