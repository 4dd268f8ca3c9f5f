use serde::{Deserialize, Serialize};

use crate::classifier::vectorizer::SparseRow;

/// Binary logistic regression trained with full-batch gradient descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on the weights (not the bias).
    pub l2: f64,
    weights: Vec<f64>,
    bias: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(1.0, 300, 1e-4)
    }
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, epochs: usize, l2: f64) -> Self {
        Self {
            learning_rate,
            epochs,
            l2,
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    /// Fit on `rows` with targets in `{0, 1}`. Starts from zero weights, so
    /// refitting is deterministic.
    pub fn fit(&mut self, rows: &[SparseRow], targets: &[usize], n_features: usize) {
        let n = rows.len() as f64;
        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;

        for _ in 0..self.epochs {
            let mut grad = vec![0.0; n_features];
            let mut grad_bias = 0.0;
            for (row, &target) in rows.iter().zip(targets) {
                let error = sigmoid(dot(&weights, bias, row)) - target as f64;
                for &(idx, value) in row {
                    grad[idx] += error * value;
                }
                grad_bias += error;
            }
            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            bias -= self.learning_rate * grad_bias / n;
        }

        self.weights = weights;
        self.bias = bias;
    }

    /// Probability of class 1 for each row.
    pub fn predict_proba(&self, rows: &[SparseRow]) -> Vec<f64> {
        rows.iter()
            .map(|row| sigmoid(dot(&self.weights, self.bias, row)))
            .collect()
    }
}

fn dot(weights: &[f64], bias: f64, row: &SparseRow) -> f64 {
    row.iter()
        .filter_map(|&(idx, value)| weights.get(idx).map(|w| w * value))
        .sum::<f64>()
        + bias
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
