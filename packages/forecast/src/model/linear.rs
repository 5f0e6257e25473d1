//! Fully connected layer with accumulated gradients.

use rand::Rng as _;
use rand::rngs::StdRng;

use super::adam::Adam;

/// `y = W x + b` with `W` stored row-major as `outputs x inputs`.
#[derive(Debug, Clone)]
pub struct Linear {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
    grad_weights: Vec<f64>,
    grad_bias: Vec<f64>,
    adam_weights: Adam,
    adam_bias: Adam,
}

impl Linear {
    /// Glorot-uniform weights and zero bias.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();

        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
            grad_weights: vec![0.0; inputs * outputs],
            grad_bias: vec![0.0; outputs],
            adam_weights: Adam::new(inputs * outputs),
            adam_bias: Adam::new(outputs),
        }
    }

    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    pub const fn outputs(&self) -> usize {
        self.outputs
    }

    /// Sets every bias in `range` to `value`.
    pub fn fill_bias(&mut self, range: std::ops::Range<usize>, value: f64) {
        for b in &mut self.bias[range] {
            *b = value;
        }
    }

    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .chunks_exact(self.inputs)
            .zip(&self.bias)
            .map(|(row, &b)| row.iter().zip(x).fold(b, |acc, (&w, &xi)| w.mul_add(xi, acc)))
            .collect()
    }

    /// Accumulates gradients for input `x` and returns `dL/dx`.
    pub fn backward(&mut self, x: &[f64], grad_out: &[f64]) -> Vec<f64> {
        let mut grad_in = vec![0.0; self.inputs];

        for ((row, grad_row), (&g, gb)) in self
            .weights
            .chunks_exact(self.inputs)
            .zip(self.grad_weights.chunks_exact_mut(self.inputs))
            .zip(grad_out.iter().zip(&mut self.grad_bias))
        {
            *gb += g;
            for (((&w, gw), &xi), gi) in row
                .iter()
                .zip(grad_row.iter_mut())
                .zip(x)
                .zip(grad_in.iter_mut())
            {
                *gw = g.mul_add(xi, *gw);
                *gi = g.mul_add(w, *gi);
            }
        }

        grad_in
    }

    pub fn zero_grad(&mut self) {
        self.grad_weights.fill(0.0);
        self.grad_bias.fill(0.0);
    }

    /// One Adam update from the accumulated gradients, scaled by `scale`.
    pub fn step(&mut self, learning_rate: f64, scale: f64) {
        self.adam_weights
            .step(&mut self.weights, &self.grad_weights, learning_rate, scale);
        self.adam_bias
            .step(&mut self.bias, &self.grad_bias, learning_rate, scale);
    }

    #[cfg(test)]
    pub fn grad_weight(&self, index: usize) -> f64 {
        self.grad_weights[index]
    }

    #[cfg(test)]
    pub fn nudge_weight(&mut self, index: usize, delta: f64) {
        self.weights[index] += delta;
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;

    use super::*;

    #[test]
    fn backward_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Linear::new(3, 2, &mut rng);
        let x = [0.3, -0.7, 1.1];

        // L = sum(y), so dL/dy = 1 and dL/dx_j = sum_i W_ij.
        let grad_in = layer.backward(&x, &[1.0, 1.0]);

        let h = 1e-6;
        for j in 0..3 {
            let mut plus = x;
            plus[j] += h;
            let mut minus = x;
            minus[j] -= h;
            let numeric = (layer.forward(&plus).iter().sum::<f64>()
                - layer.forward(&minus).iter().sum::<f64>())
                / (2.0 * h);
            assert!((numeric - grad_in[j]).abs() < 1e-6, "input {j}");
        }
    }

    #[test]
    fn step_moves_output_toward_target() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Linear::new(2, 1, &mut rng);
        let x = [1.0, 2.0];
        let target = 5.0;
        let before = (layer.forward(&x)[0] - target).powi(2);

        for _ in 0..50 {
            layer.zero_grad();
            let y = layer.forward(&x)[0];
            layer.backward(&x, &[2.0 * (y - target)]);
            layer.step(0.01, 1.0);
        }

        assert!((layer.forward(&x)[0] - target).powi(2) < before);
    }
}
