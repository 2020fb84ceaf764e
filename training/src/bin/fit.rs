use anyhow::{Context, Result};
use callbacks::Model;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;
use training::{LinearModel, Trainer, TrainingConfig};

/// Fit a linear model on synthetic data with the configured callbacks
#[derive(Parser, Debug)]
#[command(name = "fit", about = "Train a linear model with training callbacks", long_about = None)]
struct Args {
    /// JSON training configuration; defaults are used when omitted
    config: Option<PathBuf>,

    /// Override the number of epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Override the verbosity (0 silent, 1 progress bar, 2 one line per epoch)
    #[arg(short, long)]
    verbose: Option<u8>,

    /// Write the final weights here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace an existing weights file at the output path
    #[arg(long)]
    overwrite: bool,
}

/// Adds the default directives: training progress at info, callback
/// warnings at warn.
fn log_filter(base: EnvFilter) -> Result<EnvFilter> {
    Ok(base
        .add_directive("training=info".parse().context("Invalid log directive")?)
        .add_directive("callbacks=warn".parse().context("Invalid log directive")?))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::from_default_env())?)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrainingConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(verbose) = args.verbose {
        config.verbose = verbose;
    }

    let model = Rc::new(RefCell::new(LinearModel::synthetic(
        config.samples,
        config.features,
        config.learning_rate,
        config.seed,
    )));
    let nb_sample = model.borrow().nb_sample();
    let callbacks = config.callbacks().context("Failed to build callbacks")?;

    let trainer = Trainer::new(config);
    let history = trainer.fit(&model, nb_sample, callbacks)?;

    if let (Some(loss), Some(&epoch)) = (history.loss().last(), history.epoch().last()) {
        println!("\nFinished after epoch {epoch} with loss {loss:.6}");
    }
    if let Some(path) = &trainer.config().history_path {
        history
            .save(path)
            .with_context(|| format!("Failed to save history to {}", path.display()))?;
        println!("History saved to {}", path.display());
    }
    if let Some(path) = &args.output {
        model.borrow().save_weights(path, args.overwrite)?;
        println!("Weights saved to {}", path.display());
    }

    Ok(())
}
