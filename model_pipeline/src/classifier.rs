use feature_processing::misc::NUM_CLASSES;
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Anything that can be fitted on a standardized matrix and produce class ids.
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    /// Per-class probabilities, one row per sample, when the model has them.
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    Uniform,
    /// Weight `n / (k * count_c)` so every class contributes equally.
    Balanced,
}

/// Multinomial logistic regression trained by full-batch gradient descent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub l2_penalty: f64,
    pub class_weight: ClassWeight,
    coefficients: Option<Array2<f64>>,
    intercepts: Option<Array1<f64>>,
    n_iter: usize,
}

impl Default for SoftmaxRegression {
    fn default() -> Self {
        Self::new(0.1, 1000, 1e-6, 1.0)
    }
}

impl SoftmaxRegression {
    pub fn new(learning_rate: f64, max_iter: usize, tolerance: f64, l2_penalty: f64) -> Self {
        Self {
            learning_rate,
            max_iter,
            tolerance,
            l2_penalty,
            class_weight: ClassWeight::Balanced,
            coefficients: None,
            intercepts: None,
            n_iter: 0,
        }
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// `classes x features` weight matrix once fitted.
    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.coefficients.as_ref()
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn sample_weights(&self, y: &Array1<usize>) -> Array1<f64> {
        match self.class_weight {
            ClassWeight::Uniform => Array1::ones(y.len()),
            ClassWeight::Balanced => {
                let mut counts = [0usize; NUM_CLASSES];
                for &label in y {
                    counts[label] += 1;
                }
                let present = counts.iter().filter(|&&c| c > 0).count() as f64;
                let n = y.len() as f64;
                y.mapv(|label| n / (present * counts[label] as f64))
            }
        }
    }

    fn logits(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(w), Some(b)) = (&self.coefficients, &self.intercepts) else {
            return Err(PipelineError::NotFitted);
        };
        if x.ncols() != w.ncols() {
            return Err(PipelineError::DimensionMismatch {
                expected: w.ncols(),
                got: x.ncols(),
            });
        }
        Ok(x.dot(&w.t()) + b)
    }
}

fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    logits
}

fn argmax(row: ndarray::ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best, best_v) }
        })
        .0
}

impl Classifier for SoftmaxRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let (n, d) = x.dim();
        if n == 0 {
            return Err(PipelineError::EmptyPartition("train"));
        }
        if y.len() != n {
            return Err(PipelineError::DimensionMismatch { expected: n, got: y.len() });
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= NUM_CLASSES) {
            return Err(PipelineError::InvalidLabel(bad as i64));
        }

        let weights = self.sample_weights(y);
        let mut one_hot = Array2::<f64>::zeros((n, NUM_CLASSES));
        for (i, &label) in y.iter().enumerate() {
            one_hot[[i, label]] = 1.0;
        }

        let nf = n as f64;
        let mut w = Array2::<f64>::zeros((NUM_CLASSES, d));
        let mut b = Array1::<f64>::zeros(NUM_CLASSES);
        let mut previous_loss = f64::INFINITY;
        self.n_iter = 0;

        for iteration in 1..=self.max_iter {
            let probs = softmax_rows(x.dot(&w.t()) + &b);

            let loss = probs
                .outer_iter()
                .zip(y.iter())
                .zip(weights.iter())
                .map(|((row, &label), &s)| -s * row[label].max(f64::MIN_POSITIVE).ln())
                .sum::<f64>()
                / nf
                + self.l2_penalty / (2.0 * nf) * w.mapv(|v| v * v).sum();

            let residual = (probs - &one_hot) * &weights.view().insert_axis(Axis(1));
            let grad_w = residual.t().dot(x) / nf + &w * (self.l2_penalty / nf);
            let grad_b = residual.sum_axis(Axis(0)) / nf;

            w.scaled_add(-self.learning_rate, &grad_w);
            b.scaled_add(-self.learning_rate, &grad_b);
            self.n_iter = iteration;

            if (previous_loss - loss).abs() < self.tolerance {
                debug!("Converged after {} iterations (loss {:.6})", iteration, loss);
                break;
            }
            previous_loss = loss;
        }

        info!(
            "Fitted {} on {} samples x {} features in {} iterations",
            self.name(),
            n,
            d,
            self.n_iter
        );
        self.coefficients = Some(w);
        self.intercepts = Some(b);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let logits = self.logits(x)?;
        Ok(logits.outer_iter().map(argmax).collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(Some(softmax_rows(self.logits(x)?)))
    }

    fn name(&self) -> &str {
        "SoftmaxRegression"
    }
}
