//! Adam optimizer state for one parameter buffer.

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// First and second moment estimates for one parameter buffer.
#[derive(Debug, Clone)]
pub struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
            t: 0,
        }
    }

    /// Applies one bias-corrected update, scaling `grads` by `scale` first.
    pub fn step(&mut self, params: &mut [f64], grads: &[f64], learning_rate: f64, scale: f64) {
        self.t = self.t.saturating_add(1);
        let correction1 = 1.0 - BETA1.powi(self.t);
        let correction2 = 1.0 - BETA2.powi(self.t);

        for (((p, &g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(&mut self.m)
            .zip(&mut self.v)
        {
            let g = g * scale;
            *m = BETA1.mul_add(*m, (1.0 - BETA1) * g);
            *v = BETA2.mul_add(*v, (1.0 - BETA2) * g * g);
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(2);
        let mut params = vec![1.0, -1.0];
        adam.step(&mut params, &[0.5, -2.0], 0.1, 1.0);

        // Bias correction makes the first step close to `lr * sign(g)`.
        assert!((params[0] - 0.9).abs() < 1e-5);
        assert!((params[1] + 0.9).abs() < 1e-5);
    }

    #[test]
    fn zero_gradient_leaves_params() {
        let mut adam = Adam::new(1);
        let mut params = vec![3.0];
        adam.step(&mut params, &[0.0], 0.1, 1.0);
        assert!((params[0] - 3.0).abs() < f64::EPSILON);
    }
}
