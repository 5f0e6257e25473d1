//! Binary classifier for the geolocated outcome experiment.

use crime_forecast_forecast_models::FitOptions;

use super::dense::{DenseNetwork, OutputActivation};
use super::{ForecastModel, Loss};
use crate::ForecastError;

/// Dense network with a sigmoid output trained on binary cross-entropy.
///
/// Outputs are probabilities in `(0, 1)`; labels are expected to be `0.0`
/// or `1.0`.
#[derive(Debug, Clone)]
pub struct Classifier {
    network: DenseNetwork,
}

impl Classifier {
    /// # Errors
    ///
    /// * [`ForecastError::InvalidParameter`] for a zero layer size
    pub fn new(
        input_width: usize,
        hidden: &[usize],
        output_width: usize,
        seed: u64,
    ) -> Result<Self, ForecastError> {
        Ok(Self {
            network: DenseNetwork::with_output(
                input_width,
                hidden,
                output_width,
                0.0,
                OutputActivation::Sigmoid,
                Loss::BinaryCrossEntropy,
                seed,
            )?,
        })
    }

    /// Fraction of examples whose thresholded prediction equals the label
    /// in every output channel.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::ShapeMismatch`] if any row has the wrong width
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(
        &self,
        inputs: &[Vec<f64>],
        labels: &[Vec<f64>],
        threshold: f64,
    ) -> Result<f64, ForecastError> {
        super::check_examples(inputs, labels, self.input_width(), self.output_width())?;
        if inputs.is_empty() {
            return Ok(0.0);
        }

        let predictions = self.predict(inputs)?;
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|(p, t)| {
                p.iter()
                    .zip(t.iter())
                    .all(|(&p, &t)| (p >= threshold) == (t >= 0.5))
            })
            .count();

        Ok(correct as f64 / inputs.len() as f64)
    }
}

impl ForecastModel for Classifier {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn input_width(&self) -> usize {
        self.network.input_width()
    }

    fn output_width(&self) -> usize {
        self.network.output_width()
    }

    fn loss_kind(&self) -> Loss {
        Loss::BinaryCrossEntropy
    }

    fn train_epoch(
        &mut self,
        inputs: &[Vec<f64>],
        labels: &[Vec<f64>],
        options: &FitOptions,
    ) -> Result<f64, ForecastError> {
        self.network.train_epoch(inputs, labels, options)
    }

    fn predict(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError> {
        self.network.predict(inputs)
    }
}
