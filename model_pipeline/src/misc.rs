use chrono::NaiveDate;
use feature_processing::Direction;
use serde::Serialize;

/// Columns never fed to a model: identifiers, labels and the next-day return the label is built from.
pub const NON_FEATURE_COLUMNS: [&str; 4] = [
    feature_processing::misc::DATE,
    feature_processing::misc::TARGET,
    feature_processing::misc::TARGET_ENCODED,
    feature_processing::misc::RETURN_T1,
];

/// Headline numbers of one training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Id of the saved artifact, `model_{pair}_{version}`.
    pub model_name: String,
    pub balanced_accuracy: f64,
    pub f1_macro: f64,
}

/// Direction call for a single trading day.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub date: NaiveDate,
    pub direction: Direction,
    pub model_id: String,
    /// Class probabilities in down/neutral/up order, when the model exposes them.
    pub probabilities: Option<[f64; 3]>,
}
