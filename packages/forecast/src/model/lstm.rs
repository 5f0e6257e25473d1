//! Stacked LSTM regressor trained with backpropagation through time.
//!
//! An input row is `timesteps x channels` values flattened oldest first.
//! Every layer but the last feeds its full hidden sequence to the next; the
//! last layer's final hidden state goes through a linear head.

use crime_forecast_forecast_models::FitOptions;
use rand::SeedableRng as _;
use rand::rngs::StdRng;

use super::linear::Linear;
use super::{
    Backprop, ForecastModel, Loss, check_examples, check_layer_sizes, check_rows, sigmoid,
};
use crate::ForecastError;

/// Forward-pass values kept for one timestep.
struct StepCache {
    concat: Vec<f64>,
    input_gate: Vec<f64>,
    forget_gate: Vec<f64>,
    candidate: Vec<f64>,
    output_gate: Vec<f64>,
    cell_prev: Vec<f64>,
    cell_tanh: Vec<f64>,
}

/// One LSTM layer. Gate pre-activations come from a single [`Linear`] over
/// `[x_t, h_{t-1}]`, laid out as input, forget, candidate, output.
#[derive(Debug, Clone)]
struct LstmLayer {
    input_width: usize,
    units: usize,
    gates: Linear,
}

impl LstmLayer {
    fn new(input_width: usize, units: usize, rng: &mut StdRng) -> Self {
        let mut gates = Linear::new(input_width + units, 4 * units, rng);
        gates.fill_bias(units..2 * units, 1.0);
        Self {
            input_width,
            units,
            gates,
        }
    }

    fn forward(&self, xs: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<StepCache>) {
        let h = self.units;
        let mut hidden = vec![0.0; h];
        let mut cell = vec![0.0; h];
        let mut outputs = Vec::with_capacity(xs.len());
        let mut caches = Vec::with_capacity(xs.len());

        for x in xs {
            let mut concat = Vec::with_capacity(self.input_width + h);
            concat.extend_from_slice(x);
            concat.extend_from_slice(&hidden);

            let z = self.gates.forward(&concat);
            let input_gate: Vec<f64> = z[..h].iter().copied().map(sigmoid).collect();
            let forget_gate: Vec<f64> = z[h..2 * h].iter().copied().map(sigmoid).collect();
            let candidate: Vec<f64> = z[2 * h..3 * h].iter().map(|v| v.tanh()).collect();
            let output_gate: Vec<f64> = z[3 * h..].iter().copied().map(sigmoid).collect();

            let cell_prev = cell;
            cell = (0..h)
                .map(|j| forget_gate[j].mul_add(cell_prev[j], input_gate[j] * candidate[j]))
                .collect();
            let cell_tanh: Vec<f64> = cell.iter().map(|c| c.tanh()).collect();
            hidden = (0..h).map(|j| output_gate[j] * cell_tanh[j]).collect();

            outputs.push(hidden.clone());
            caches.push(StepCache {
                concat,
                input_gate,
                forget_gate,
                candidate,
                output_gate,
                cell_prev,
                cell_tanh,
            });
        }

        (outputs, caches)
    }

    /// Accumulates gradients given `dL/dh_t` for every step and returns
    /// `dL/dx_t` for every step.
    fn backward(&mut self, caches: &[StepCache], grad_hidden: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let h = self.units;
        let mut grad_inputs = vec![Vec::new(); caches.len()];
        let mut dh_next = vec![0.0; h];
        let mut dc_next = vec![0.0; h];

        for t in (0..caches.len()).rev() {
            let cache = &caches[t];
            let mut dz = vec![0.0; 4 * h];

            for j in 0..h {
                let dh = grad_hidden[t][j] + dh_next[j];
                let o = cache.output_gate[j];
                let i = cache.input_gate[j];
                let f = cache.forget_gate[j];
                let g = cache.candidate[j];
                let tc = cache.cell_tanh[j];

                let dc = (dh * o).mul_add(1.0 - tc * tc, dc_next[j]);

                dz[j] = dc * g * i * (1.0 - i);
                dz[h + j] = dc * cache.cell_prev[j] * f * (1.0 - f);
                dz[2 * h + j] = dc * i * g.mul_add(-g, 1.0);
                dz[3 * h + j] = dh * tc * o * (1.0 - o);

                dc_next[j] = dc * f;
            }

            let grad_concat = self.gates.backward(&cache.concat, &dz);
            dh_next = grad_concat[self.input_width..].to_vec();
            grad_inputs[t] = grad_concat[..self.input_width].to_vec();
        }

        grad_inputs
    }
}

/// Sequence-to-value regressor over sliding windows.
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    timesteps: usize,
    channels: usize,
    layers: Vec<LstmLayer>,
    head: Linear,
    rng: StdRng,
}

impl LstmNetwork {
    /// # Errors
    ///
    /// * [`ForecastError::InvalidParameter`] if `units` is empty or contains
    ///   zero, `timesteps` is zero, or `input_width` is not a multiple of
    ///   `timesteps`
    pub fn new(
        timesteps: usize,
        input_width: usize,
        units: &[usize],
        output_width: usize,
        seed: u64,
    ) -> Result<Self, ForecastError> {
        if units.is_empty() {
            return Err(ForecastError::invalid("LSTM needs at least one layer"));
        }
        check_layer_sizes(units, "LSTM layer")?;
        if timesteps == 0 || input_width % timesteps != 0 {
            return Err(ForecastError::invalid(format!(
                "input width {input_width} does not split into {timesteps} timesteps"
            )));
        }

        let channels = input_width / timesteps;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut layers = Vec::with_capacity(units.len());
        let mut width = channels;
        for &u in units {
            layers.push(LstmLayer::new(width, u, &mut rng));
            width = u;
        }
        let head = Linear::new(width, output_width, &mut rng);

        Ok(Self {
            timesteps,
            channels,
            layers,
            head,
            rng,
        })
    }

    fn split_steps(&self, row: &[f64]) -> Vec<Vec<f64>> {
        row.chunks_exact(self.channels).map(<[f64]>::to_vec).collect()
    }

    fn forward(&self, row: &[f64]) -> (Vec<Vec<StepCache>>, Vec<f64>, Vec<f64>) {
        let mut sequence = self.split_steps(row);
        let mut caches = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let (outputs, layer_caches) = layer.forward(&sequence);
            caches.push(layer_caches);
            sequence = outputs;
        }

        let last_hidden = sequence.pop().unwrap_or_default();
        let output = self.head.forward(&last_hidden);
        (caches, last_hidden, output)
    }
}

impl Backprop for LstmNetwork {
    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn zero_grad(&mut self) {
        self.head.zero_grad();
        for layer in &mut self.layers {
            layer.gates.zero_grad();
        }
    }

    fn accumulate(&mut self, input: &[f64], label: &[f64]) -> f64 {
        let (caches, last_hidden, output) = self.forward(input);
        let loss = Loss::MeanSquaredError.value(&output, label);
        let grad_output = Loss::MeanSquaredError.output_gradient(&output, label);

        let grad_last = self.head.backward(&last_hidden, &grad_output);

        let top_units = self.layers.last().map_or(0, |l| l.units);
        let mut grad_sequence = vec![vec![0.0; top_units]; self.timesteps];
        if let Some(last) = grad_sequence.last_mut() {
            *last = grad_last;
        }

        for (layer, layer_caches) in self.layers.iter_mut().zip(&caches).rev() {
            grad_sequence = layer.backward(layer_caches, &grad_sequence);
        }

        loss
    }

    fn apply(&mut self, learning_rate: f64, scale: f64) {
        self.head.step(learning_rate, scale);
        for layer in &mut self.layers {
            layer.gates.step(learning_rate, scale);
        }
    }
}

impl ForecastModel for LstmNetwork {
    fn name(&self) -> &'static str {
        "lstm"
    }

    fn input_width(&self) -> usize {
        self.timesteps * self.channels
    }

    fn output_width(&self) -> usize {
        self.head.outputs()
    }

    fn loss_kind(&self) -> Loss {
        Loss::MeanSquaredError
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
        Ok(inputs.iter().map(|row| self.forward(row).2).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_matches_finite_difference() {
        let mut model = LstmNetwork::new(3, 6, &[4, 3], 2, 11).unwrap();
        let input = vec![0.1, 0.9, -0.4, 0.3, 0.7, -0.2];
        let label = vec![0.5, -0.5];

        model.zero_grad();
        model.accumulate(&input, &label);
        let analytic = model.layers[0].gates.grad_weight(0);

        let h = 1e-6;
        let mut plus = model.clone();
        plus.layers[0].gates.nudge_weight(0, h);
        let mut minus = model.clone();
        minus.layers[0].gates.nudge_weight(0, -h);

        let loss_plus = Loss::MeanSquaredError.value(&plus.forward(&input).2, &label);
        let loss_minus = Loss::MeanSquaredError.value(&minus.forward(&input).2, &label);
        let numeric = (loss_plus - loss_minus) / (2.0 * h);

        assert!(
            (numeric - analytic).abs() < 1e-6,
            "numeric {numeric} vs analytic {analytic}"
        );
    }

    #[test]
    fn training_reduces_loss_on_sequences() {
        // Predict the next value of a slowly rising ramp.
        let mut inputs = Vec::new();
        let mut labels = Vec::new();
        for start in 0..12 {
            let s = f64::from(start) / 20.0;
            inputs.push(vec![s, s + 0.05, s + 0.1]);
            labels.push(vec![s + 0.15]);
        }

        let mut model = LstmNetwork::new(3, 3, &[8], 1, 4).unwrap();
        let options = FitOptions {
            epochs: 150,
            learning_rate: 0.01,
            batch_size: 4,
            seed: 4,
            shuffle: true,
        };

        let before = model.loss(&inputs, &labels).unwrap();
        model.fit(&inputs, &labels, &options).unwrap();
        let after = model.loss(&inputs, &labels).unwrap();

        assert!(after < before, "loss {before} -> {after}");
    }

    #[test]
    fn multi_channel_rows_are_accepted() {
        let model = LstmNetwork::new(2, 6, &[5, 5], 3, 0).unwrap();
        let out = model.predict(&[vec![0.0; 6]]).unwrap();
        assert_eq!(out[0].len(), 3);
    }

    #[test]
    fn uneven_timesteps_are_invalid() {
        assert!(LstmNetwork::new(4, 6, &[5], 1, 0).is_err());
        assert!(LstmNetwork::new(2, 6, &[], 1, 0).is_err());
    }
}
