//! A linear regression model fitted with mini-batch gradient descent.
//!
//! The model carries its own synthetic data set: targets are drawn from a
//! hidden linear function with a little uniform noise, and a fifth of the
//! samples is held out for validation.
use crate::training::{BatchMetrics, Trainable};
use anyhow::{Context, bail};
use callbacks::Model;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fraction of generated samples held out for validation.
const VALIDATION_SPLIT: f64 = 0.2;

/// Amplitude of the noise added to generated targets.
const NOISE: f64 = 0.01;

/// Predictions this close to their target count as correct.
const TOLERANCE: f64 = 0.1;

/// The learnable parameters, as persisted by `save_weights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Debug, Clone, Default)]
struct Dataset {
    inputs: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl Dataset {
    fn len(&self) -> usize {
        self.targets.len()
    }

    fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// `y = w·x + b`, trained on mean squared error.
#[derive(Debug, Clone)]
pub struct LinearModel {
    params: LinearWeights,
    learning_rate: f64,
    train: Dataset,
    validation: Dataset,
    stop_training: bool,
}

impl LinearModel {
    /// Creates a zero-initialised model and `samples` synthetic samples of
    /// `features` inputs each.
    pub fn synthetic(samples: usize, features: usize, learning_rate: f64, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let truth = LinearWeights {
            weights: (0..features).map(|_| rng.random_range(-2.0..2.0)).collect(),
            bias: rng.random_range(-1.0..1.0),
        };

        let held_out = (samples as f64 * VALIDATION_SPLIT) as usize;
        let mut generate = |count: usize| {
            let mut data = Dataset::default();
            for _ in 0..count {
                let input: Vec<f64> = (0..features).map(|_| rng.random_range(-1.0..1.0)).collect();
                let noise = rng.random_range(-NOISE..NOISE);
                data.targets.push(predict(&truth, &input) + noise);
                data.inputs.push(input);
            }
            data
        };
        let train = generate(samples - held_out);
        let validation = generate(held_out);

        Self {
            params: LinearWeights {
                weights: vec![0.0; features],
                bias: 0.0,
            },
            learning_rate,
            train,
            validation,
            stop_training: false,
        }
    }

    pub fn weights(&self) -> &LinearWeights {
        &self.params
    }

    /// Number of samples available to `train_batch`.
    pub fn nb_sample(&self) -> usize {
        self.train.len()
    }

    /// Replaces the parameters with those saved at `path`.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read weights from {}", path.display()))?;
        let params: LinearWeights = serde_json::from_str(&json)?;
        if params.weights.len() != self.params.weights.len() {
            bail!(
                "Expected {} weights, found {}",
                self.params.weights.len(),
                params.weights.len()
            );
        }
        self.params = params;
        Ok(())
    }

    fn metrics<'a>(&self, samples: impl Iterator<Item = (&'a Vec<f64>, f64)>) -> BatchMetrics {
        let (mut count, mut squared_error, mut correct) = (0usize, 0.0, 0usize);
        for (input, target) in samples {
            let error = predict(&self.params, input) - target;
            squared_error += error * error;
            if error.abs() < TOLERANCE {
                correct += 1;
            }
            count += 1;
        }
        let count = count as f64;
        BatchMetrics {
            loss: squared_error / count,
            accuracy: Some(correct as f64 / count),
        }
    }
}

fn predict(params: &LinearWeights, input: &[f64]) -> f64 {
    params
        .weights
        .iter()
        .zip(input)
        .map(|(w, x)| w * x)
        .sum::<f64>()
        + params.bias
}

impl Model for LinearModel {
    fn save_weights(&self, path: &Path, overwrite: bool) -> anyhow::Result<()> {
        if !overwrite && path.exists() {
            bail!("{} already exists", path.display());
        }
        let json = serde_json::to_string_pretty(&self.params)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write weights to {}", path.display()))?;
        Ok(())
    }

    fn stop_training(&self) -> bool {
        self.stop_training
    }

    fn set_stop_training(&mut self, stop: bool) {
        self.stop_training = stop;
    }
}

impl Trainable for LinearModel {
    /// Takes one gradient step on the given samples. The returned metrics
    /// describe the batch before the step.
    fn train_batch(&mut self, indices: &[usize]) -> anyhow::Result<BatchMetrics> {
        let batch: Vec<(&Vec<f64>, f64)> = indices
            .iter()
            .map(|&index| {
                self.train
                    .inputs
                    .get(index)
                    .zip(self.train.targets.get(index).copied())
                    .with_context(|| format!("Sample {index} is out of range"))
            })
            .collect::<anyhow::Result<_>>()?;
        if batch.is_empty() {
            bail!("Cannot train on an empty batch");
        }

        let metrics = self.metrics(batch.iter().copied());

        let scale = 2.0 / batch.len() as f64;
        let mut weight_grads = vec![0.0; self.params.weights.len()];
        let mut bias_grad = 0.0;
        for (input, target) in &batch {
            let error = predict(&self.params, input) - target;
            for (grad, x) in weight_grads.iter_mut().zip(input.iter()) {
                *grad += scale * error * x;
            }
            bias_grad += scale * error;
        }
        for (weight, grad) in self.params.weights.iter_mut().zip(weight_grads) {
            *weight -= self.learning_rate * grad;
        }
        self.params.bias -= self.learning_rate * bias_grad;

        Ok(metrics)
    }

    fn evaluate(&self) -> anyhow::Result<BatchMetrics> {
        if self.validation.is_empty() {
            bail!("No validation samples");
        }
        Ok(self.metrics(
            self.validation
                .inputs
                .iter()
                .zip(self.validation.targets.iter().copied()),
        ))
    }
}
