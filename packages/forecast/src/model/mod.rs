//! Trainable model family.
//!
//! Every model is a small network over `Vec<f64>` rows with its own seeded
//! [`StdRng`], trained with Adam on mini-batches. [`build_model`] maps a
//! [`ModelConfig`] to a boxed [`ForecastModel`].

pub mod adam;
pub mod classifier;
pub mod dense;
pub mod linear;
pub mod lstm;

use crime_forecast_forecast_models::{FitOptions, ModelConfig, TrainingHistory};
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;

use crate::ForecastError;

pub use classifier::Classifier;
pub use dense::DenseNetwork;
pub use lstm::LstmNetwork;

/// Minimum number of training examples any model accepts.
pub const MIN_TRAINING_EXAMPLES: usize = 2;

/// Objective minimized during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    MeanSquaredError,
    BinaryCrossEntropy,
}

impl Loss {
    const PROBABILITY_CLAMP: f64 = 1e-7;

    /// Loss of one example, averaged over output channels.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(self, output: &[f64], target: &[f64]) -> f64 {
        let k = output.len().max(1) as f64;
        let sum: f64 = match self {
            Self::MeanSquaredError => output
                .iter()
                .zip(target)
                .map(|(&y, &t)| (y - t).powi(2))
                .sum(),
            Self::BinaryCrossEntropy => output
                .iter()
                .zip(target)
                .map(|(&p, &t)| {
                    let p = p.clamp(Self::PROBABILITY_CLAMP, 1.0 - Self::PROBABILITY_CLAMP);
                    -t.mul_add(p.ln(), (1.0 - t) * (1.0 - p).ln())
                })
                .sum(),
        };
        sum / k
    }

    /// Gradient with respect to the final layer's pre-activation.
    ///
    /// Mean squared error pairs with a linear output and binary
    /// cross-entropy with a sigmoid output, which makes both gradients a
    /// scaled residual.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn output_gradient(self, output: &[f64], target: &[f64]) -> Vec<f64> {
        let k = output.len().max(1) as f64;
        output
            .iter()
            .zip(target)
            .map(|(&y, &t)| match self {
                Self::MeanSquaredError => 2.0 * (y - t) / k,
                Self::BinaryCrossEntropy => (y - t) / k,
            })
            .collect()
    }
}

/// Row widths a model is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    /// Flattened input row width.
    pub input_width: usize,
    /// Label row width.
    pub output_width: usize,
    /// Timesteps an input row is split into. `1` for non-recurrent models.
    pub timesteps: usize,
}

impl ModelShape {
    #[must_use]
    pub const fn flat(input_width: usize, output_width: usize) -> Self {
        Self {
            input_width,
            output_width,
            timesteps: 1,
        }
    }
}

/// A regression or classification model trained on `f64` rows.
pub trait ForecastModel: Send {
    /// Family name used in logs.
    fn name(&self) -> &'static str;

    fn input_width(&self) -> usize;

    fn output_width(&self) -> usize;

    fn loss_kind(&self) -> Loss;

    /// Runs one full pass over the examples and returns the mean loss
    /// observed while training.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::ShapeMismatch`] if any row has the wrong width or
    ///   the input and label counts differ
    fn train_epoch(
        &mut self,
        inputs: &[Vec<f64>],
        labels: &[Vec<f64>],
        options: &FitOptions,
    ) -> Result<f64, ForecastError>;

    /// Predicts one output row per input row.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::ShapeMismatch`] if any row has the wrong width
    fn predict(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError>;

    /// Mean loss over the examples without updating weights.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::ShapeMismatch`] if any row has the wrong width
    #[allow(clippy::cast_precision_loss)]
    fn loss(&self, inputs: &[Vec<f64>], labels: &[Vec<f64>]) -> Result<f64, ForecastError> {
        check_examples(inputs, labels, self.input_width(), self.output_width())?;
        let outputs = self.predict(inputs)?;
        let kind = self.loss_kind();
        let total: f64 = outputs
            .iter()
            .zip(labels)
            .map(|(y, t)| kind.value(y, t))
            .sum();
        Ok(total / inputs.len().max(1) as f64)
    }

    /// Trains for the full epoch budget with no early stopping.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] with fewer than
    ///   [`MIN_TRAINING_EXAMPLES`] examples
    /// * [`ForecastError::InvalidParameter`] for unusable [`FitOptions`]
    /// * [`ForecastError::ShapeMismatch`] for malformed rows
    fn fit(
        &mut self,
        inputs: &[Vec<f64>],
        labels: &[Vec<f64>],
        options: &FitOptions,
    ) -> Result<TrainingHistory, ForecastError> {
        ensure_trainable(inputs.len())?;
        validate_options(options)?;

        let mut history = TrainingHistory::default();
        for epoch in 1..=options.epochs {
            let loss = self.train_epoch(inputs, labels, options)?;
            history.push(epoch, loss);
        }
        Ok(history)
    }
}

/// Builds a freshly initialized model.
///
/// # Errors
///
/// * [`ForecastError::InvalidParameter`] for zero widths, empty or zero
///   layer sizes, a dropout rate outside `[0, 1)`, or an input width that
///   does not split evenly into `shape.timesteps`
pub fn build_model(
    config: &ModelConfig,
    shape: ModelShape,
    seed: u64,
) -> Result<Box<dyn ForecastModel>, ForecastError> {
    if shape.input_width == 0 || shape.output_width == 0 {
        return Err(ForecastError::invalid("model widths must be non-zero"));
    }

    log::debug!(
        "building {} model ({} -> {}, seed {seed})",
        config.family(),
        shape.input_width,
        shape.output_width
    );

    let model: Box<dyn ForecastModel> = match config {
        ModelConfig::Dense { hidden, dropout } => Box::new(DenseNetwork::new(
            shape.input_width,
            hidden,
            shape.output_width,
            *dropout,
            seed,
        )?),
        ModelConfig::Lstm { units } => Box::new(LstmNetwork::new(
            shape.timesteps,
            shape.input_width,
            units,
            shape.output_width,
            seed,
        )?),
        ModelConfig::Classifier { hidden } => Box::new(Classifier::new(
            shape.input_width,
            hidden,
            shape.output_width,
            seed,
        )?),
    };
    Ok(model)
}

/// # Errors
///
/// * [`ForecastError::InsufficientData`] with fewer than
///   [`MIN_TRAINING_EXAMPLES`] examples
pub const fn ensure_trainable(examples: usize) -> Result<(), ForecastError> {
    if examples < MIN_TRAINING_EXAMPLES {
        return Err(ForecastError::InsufficientData {
            unit: "training examples",
            needed: MIN_TRAINING_EXAMPLES,
            got: examples,
        });
    }
    Ok(())
}

pub(crate) fn validate_options(options: &FitOptions) -> Result<(), ForecastError> {
    if options.batch_size == 0 {
        return Err(ForecastError::invalid("batch_size must be at least 1"));
    }
    if !(options.learning_rate.is_finite() && options.learning_rate > 0.0) {
        return Err(ForecastError::invalid(format!(
            "learning_rate must be positive, got {}",
            options.learning_rate
        )));
    }
    Ok(())
}

pub(crate) fn check_rows(
    rows: &[Vec<f64>],
    width: usize,
    what: &'static str,
) -> Result<(), ForecastError> {
    match rows.iter().find(|r| r.len() != width) {
        Some(row) => Err(ForecastError::ShapeMismatch {
            what,
            expected: width,
            got: row.len(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_examples(
    inputs: &[Vec<f64>],
    labels: &[Vec<f64>],
    input_width: usize,
    output_width: usize,
) -> Result<(), ForecastError> {
    if inputs.len() != labels.len() {
        return Err(ForecastError::ShapeMismatch {
            what: "label count",
            expected: inputs.len(),
            got: labels.len(),
        });
    }
    check_rows(inputs, input_width, "input row")?;
    check_rows(labels, output_width, "label row")
}

pub(crate) fn check_layer_sizes(sizes: &[usize], what: &str) -> Result<(), ForecastError> {
    if sizes.contains(&0) {
        return Err(ForecastError::invalid(format!("{what} sizes must be non-zero")));
    }
    Ok(())
}

/// Gradient-accumulating internals shared by the network types.
pub(crate) trait Backprop {
    fn rng(&mut self) -> &mut StdRng;

    fn zero_grad(&mut self);

    /// Forward and backward pass for one example; returns its loss.
    fn accumulate(&mut self, input: &[f64], label: &[f64]) -> f64;

    fn apply(&mut self, learning_rate: f64, scale: f64);
}

/// One shuffled mini-batch pass. Returns the mean per-example loss.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn run_epoch<M: Backprop>(
    model: &mut M,
    inputs: &[Vec<f64>],
    labels: &[Vec<f64>],
    options: &FitOptions,
) -> f64 {
    let mut order: Vec<usize> = (0..inputs.len()).collect();
    if options.shuffle {
        order.shuffle(model.rng());
    }

    let mut total = 0.0;
    for batch in order.chunks(options.batch_size.max(1)) {
        model.zero_grad();
        for &i in batch {
            total += model.accumulate(&inputs[i], &labels[i]);
        }
        model.apply(options.learning_rate, 1.0 / batch.len() as f64);
    }

    total / inputs.len().max(1) as f64
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_set() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let inputs: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i) / 10.0]).collect();
        let labels = inputs.iter().map(|x| vec![0.2 + 0.6 * x[0]]).collect();
        (inputs, labels)
    }

    #[test]
    fn fit_refuses_fewer_than_two_examples() {
        let mut model = build_model(
            &ModelConfig::Dense {
                hidden: vec![4],
                dropout: 0.0,
            },
            ModelShape::flat(1, 1),
            0,
        )
        .unwrap();

        let result = model.fit(&[vec![0.5]], &[vec![0.5]], &FitOptions::default());
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData { needed: 2, got: 1, .. })
        ));
    }

    #[test]
    fn fit_runs_every_epoch() {
        let (inputs, labels) = linear_set();
        let mut model = build_model(
            &ModelConfig::Dense {
                hidden: vec![8],
                dropout: 0.0,
            },
            ModelShape::flat(1, 1),
            3,
        )
        .unwrap();

        let options = FitOptions {
            epochs: 17,
            ..FitOptions::default()
        };
        let history = model.fit(&inputs, &labels, &options).unwrap();
        assert_eq!(history.epochs.len(), 17);
        assert_eq!(history.epochs.last().unwrap().epoch, 17);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let (inputs, labels) = linear_set();
        let mut model = build_model(
            &ModelConfig::Dense {
                hidden: vec![],
                dropout: 0.0,
            },
            ModelShape::flat(1, 1),
            0,
        )
        .unwrap();

        let options = FitOptions {
            batch_size: 0,
            ..FitOptions::default()
        };
        assert!(matches!(
            model.fit(&inputs, &labels, &options),
            Err(ForecastError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn zero_widths_are_invalid() {
        let config = ModelConfig::Dense {
            hidden: vec![4],
            dropout: 0.0,
        };
        assert!(build_model(&config, ModelShape::flat(0, 1), 0).is_err());
    }

    #[test]
    fn mismatched_label_count_is_a_shape_error() {
        let model = build_model(
            &ModelConfig::Dense {
                hidden: vec![2],
                dropout: 0.0,
            },
            ModelShape::flat(1, 1),
            0,
        )
        .unwrap();

        assert!(matches!(
            model.loss(&[vec![1.0], vec![2.0]], &[vec![1.0]]),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn bce_gradient_is_residual() {
        let grad = Loss::BinaryCrossEntropy.output_gradient(&[0.8], &[1.0]);
        assert!((grad[0] + 0.2).abs() < 1e-12);
        let mse = Loss::MeanSquaredError.output_gradient(&[3.0, 1.0], &[1.0, 1.0]);
        assert!((mse[0] - 2.0).abs() < 1e-12);
        assert!(mse[1].abs() < 1e-12);
    }
}
