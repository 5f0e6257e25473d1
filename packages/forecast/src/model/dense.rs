//! Feed-forward network with ReLU hidden layers.

use crime_forecast_forecast_models::FitOptions;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use super::linear::Linear;
use super::{Backprop, ForecastModel, Loss, check_examples, check_layer_sizes, check_rows};
use crate::ForecastError;

/// Activation applied to the final layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputActivation {
    Identity,
    Sigmoid,
}

/// Values recorded during a forward pass for backpropagation.
struct Trace {
    /// Input to each layer.
    layer_inputs: Vec<Vec<f64>>,
    /// Pre-activation of each hidden layer.
    hidden_pre: Vec<Vec<f64>>,
    output: Vec<f64>,
}

/// Dense regressor (or, with a sigmoid output, classifier).
///
/// Inverted dropout is applied to the first hidden layer's activations
/// during training only; prediction is deterministic.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<Linear>,
    dropout: f64,
    activation: OutputActivation,
    loss: Loss,
    rng: StdRng,
}

impl DenseNetwork {
    /// Linear-output regressor trained with mean squared error.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InvalidParameter`] for a zero layer size or a
    ///   dropout rate outside `[0, 1)`
    pub fn new(
        input_width: usize,
        hidden: &[usize],
        output_width: usize,
        dropout: f64,
        seed: u64,
    ) -> Result<Self, ForecastError> {
        Self::with_output(
            input_width,
            hidden,
            output_width,
            dropout,
            OutputActivation::Identity,
            Loss::MeanSquaredError,
            seed,
        )
    }

    pub(crate) fn with_output(
        input_width: usize,
        hidden: &[usize],
        output_width: usize,
        dropout: f64,
        activation: OutputActivation,
        loss: Loss,
        seed: u64,
    ) -> Result<Self, ForecastError> {
        check_layer_sizes(hidden, "hidden layer")?;
        if !(0.0..1.0).contains(&dropout) {
            return Err(ForecastError::invalid(format!(
                "dropout must be in [0, 1), got {dropout}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(input_width);
        widths.extend_from_slice(hidden);
        widths.push(output_width);

        let layers = widths
            .windows(2)
            .map(|w| Linear::new(w[0], w[1], &mut rng))
            .collect();

        Ok(Self {
            layers,
            dropout,
            activation,
            loss,
            rng,
        })
    }

    fn dropout_mask(&mut self) -> Option<Vec<f64>> {
        if self.dropout <= 0.0 || self.layers.len() < 2 {
            return None;
        }
        let keep = 1.0 - self.dropout;
        let width = self.layers[0].outputs();
        Some(
            (0..width)
                .map(|_| {
                    if self.rng.r#gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                })
                .collect(),
        )
    }

    fn forward(&self, x: &[f64], mask: Option<&[f64]>) -> Trace {
        let last = self.layers.len() - 1;
        let mut layer_inputs = Vec::with_capacity(self.layers.len());
        let mut hidden_pre = Vec::with_capacity(last);
        let mut activation = x.to_vec();

        for (l, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&activation);
            layer_inputs.push(activation);

            if l == last {
                let output = match self.activation {
                    OutputActivation::Identity => z,
                    OutputActivation::Sigmoid => z.into_iter().map(super::sigmoid).collect(),
                };
                return Trace {
                    layer_inputs,
                    hidden_pre,
                    output,
                };
            }

            let mut a: Vec<f64> = z.iter().map(|&v| v.max(0.0)).collect();
            if l == 0
                && let Some(mask) = mask
            {
                for (a, m) in a.iter_mut().zip(mask) {
                    *a *= m;
                }
            }
            hidden_pre.push(z);
            activation = a;
        }

        Trace {
            layer_inputs,
            hidden_pre,
            output: activation,
        }
    }

    fn backward(&mut self, trace: &Trace, output_grad: Vec<f64>, mask: Option<&[f64]>) {
        let last = self.layers.len() - 1;
        let mut grad = output_grad;

        for l in (0..=last).rev() {
            if l < last {
                if l == 0
                    && let Some(mask) = mask
                {
                    for (g, m) in grad.iter_mut().zip(mask) {
                        *g *= m;
                    }
                }
                for (g, &z) in grad.iter_mut().zip(&trace.hidden_pre[l]) {
                    if z <= 0.0 {
                        *g = 0.0;
                    }
                }
            }
            grad = self.layers[l].backward(&trace.layer_inputs[l], &grad);
        }
    }
}

impl Backprop for DenseNetwork {
    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }

    fn accumulate(&mut self, input: &[f64], label: &[f64]) -> f64 {
        let mask = self.dropout_mask();
        let trace = self.forward(input, mask.as_deref());
        let loss = self.loss.value(&trace.output, label);
        let grad = self.loss.output_gradient(&trace.output, label);
        self.backward(&trace, grad, mask.as_deref());
        loss
    }

    fn apply(&mut self, learning_rate: f64, scale: f64) {
        for layer in &mut self.layers {
            layer.step(learning_rate, scale);
        }
    }
}

impl ForecastModel for DenseNetwork {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn input_width(&self) -> usize {
        self.layers.first().map_or(0, Linear::inputs)
    }

    fn output_width(&self) -> usize {
        self.layers.last().map_or(0, Linear::outputs)
    }

    fn loss_kind(&self) -> Loss {
        self.loss
    }

    fn train_epoch(
        &mut self,
        inputs: &[Vec<f64>],
        labels: &[Vec<f64>],
        options: &FitOptions,
    ) -> Result<f64, ForecastError> {
        check_examples(inputs, labels, self.input_width(), self.output_width())?;
        Ok(super::run_epoch(self, inputs, labels, options))
    }

    fn predict(&self, inputs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError> {
        check_rows(inputs, self.input_width(), "input row")?;
        Ok(inputs.iter().map(|x| self.forward(x, None).output).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_set() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let inputs: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i) / 20.0]).collect();
        let labels = inputs.iter().map(|x| vec![0.1 + 0.8 * x[0]]).collect();
        (inputs, labels)
    }

    #[test]
    fn training_reduces_loss() {
        let (inputs, labels) = linear_set();
        let mut model = DenseNetwork::new(1, &[16, 16], 1, 0.0, 42).unwrap();
        let options = FitOptions {
            epochs: 200,
            learning_rate: 0.01,
            batch_size: 8,
            seed: 42,
            shuffle: true,
        };

        let before = model.loss(&inputs, &labels).unwrap();
        model.fit(&inputs, &labels, &options).unwrap();
        let after = model.loss(&inputs, &labels).unwrap();

        assert!(after < before, "loss {before} -> {after}");
        assert!(after < 0.01, "final loss {after}");
    }

    #[test]
    fn same_seed_trains_identically() {
        let (inputs, labels) = linear_set();
        let options = FitOptions {
            epochs: 20,
            learning_rate: 0.01,
            batch_size: 4,
            seed: 9,
            shuffle: true,
        };

        let mut a = DenseNetwork::new(1, &[10], 1, 0.2, 9).unwrap();
        let mut b = DenseNetwork::new(1, &[10], 1, 0.2, 9).unwrap();
        a.fit(&inputs, &labels, &options).unwrap();
        b.fit(&inputs, &labels, &options).unwrap();

        assert_eq!(a.predict(&inputs).unwrap(), b.predict(&inputs).unwrap());
    }

    #[test]
    fn prediction_ignores_dropout() {
        let model = DenseNetwork::new(2, &[8], 1, 0.5, 1).unwrap();
        let x = vec![vec![0.3, 0.7]];
        assert_eq!(model.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn rejects_bad_dropout_and_widths() {
        assert!(DenseNetwork::new(1, &[4], 1, 1.0, 0).is_err());
        assert!(DenseNetwork::new(1, &[0], 1, 0.0, 0).is_err());

        let model = DenseNetwork::new(3, &[4], 1, 0.0, 0).unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ForecastError::ShapeMismatch { expected: 3, got: 1, .. })
        ));
    }
}
