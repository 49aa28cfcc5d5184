use feature_processing::misc::NUM_CLASSES;
use log::info;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::fmt;

use crate::classifier::Classifier;
use crate::error::{PipelineError, Result};

/// Counts indexed `[true][predicted]` over the down/neutral/up classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Result<Self> {
        if labels.len() != NUM_CLASSES {
            return Err(PipelineError::DimensionMismatch {
                expected: NUM_CLASSES,
                got: labels.len(),
            });
        }
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: y_true.len(),
                got: y_pred.len(),
            });
        }
        let mut counts = [[0usize; NUM_CLASSES]; NUM_CLASSES];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t >= NUM_CLASSES {
                return Err(PipelineError::InvalidLabel(t as i64));
            }
            if p >= NUM_CLASSES {
                return Err(PipelineError::InvalidLabel(p as i64));
            }
            counts[t][p] += 1;
        }
        Ok(Self {
            labels: labels.to_vec(),
            counts,
        })
    }

    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    pub fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// `None` when the class never occurs in the ground truth.
    pub fn recall(&self, class: usize) -> Option<f64> {
        let support = self.support(class);
        (support > 0).then(|| self.counts[class][class] as f64 / support as f64)
    }

    /// Zero when the class is never predicted.
    pub fn precision(&self, class: usize) -> f64 {
        let predicted = self.predicted(class);
        if predicted == 0 {
            0.0
        } else {
            self.counts[class][class] as f64 / predicted as f64
        }
    }

    /// Zero when precision and recall are both zero.
    pub fn f1(&self, class: usize) -> f64 {
        let precision = self.precision(class);
        let recall = self.recall(class).unwrap_or(0.0);
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    /// Mean recall over classes present in the ground truth.
    pub fn balanced_accuracy(&self) -> f64 {
        let recalls: Vec<f64> = (0..NUM_CLASSES).filter_map(|c| self.recall(c)).collect();
        if recalls.is_empty() {
            0.0
        } else {
            recalls.iter().sum::<f64>() / recalls.len() as f64
        }
    }

    /// Unweighted mean F1 over classes seen in either the ground truth or the predictions.
    pub fn f1_macro(&self) -> f64 {
        let seen: Vec<usize> = (0..NUM_CLASSES)
            .filter(|&c| self.support(c) > 0 || self.predicted(c) > 0)
            .collect();
        if seen.is_empty() {
            0.0
        } else {
            seen.iter().map(|&c| self.f1(c)).sum::<f64>() / seen.len() as f64
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.labels.iter().map(String::len).max().unwrap_or(0).max(6);
        write!(f, "{:width$}", "")?;
        for label in &self.labels {
            write!(f, " {label:>width$}")?;
        }
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "\n{label:width$}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub model_id: String,
    pub balanced_accuracy: f64,
    pub f1_macro: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub y_true: Vec<usize>,
    pub predictions: Vec<usize>,
}

/// Scores `model` on the held-out partition.
pub fn evaluate<C: Classifier>(
    model_id: &str,
    model: &C,
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
    label_names: &[String],
) -> Result<EvaluationResult> {
    if x_test.nrows() == 0 {
        return Err(PipelineError::EmptyPartition("test"));
    }
    let predictions = model.predict(x_test)?.to_vec();
    let y_true = y_test.to_vec();
    let confusion_matrix = ConfusionMatrix::from_predictions(&y_true, &predictions, label_names)?;

    let result = EvaluationResult {
        model_id: model_id.to_string(),
        balanced_accuracy: confusion_matrix.balanced_accuracy(),
        f1_macro: confusion_matrix.f1_macro(),
        confusion_matrix,
        y_true,
        predictions,
    };

    info!("Evaluation of {}", result.model_id);
    info!("Balanced accuracy: {:.4}", result.balanced_accuracy);
    info!("F1 macro: {:.4}", result.f1_macro);
    info!("Confusion matrix:\n{}", result.confusion_matrix);
    Ok(result)
}
