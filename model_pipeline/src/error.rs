use feature_processing::FeatureError;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scaler is not fitted; run split before scale")]
    NotFitted,

    #[error("No model artifact for pair '{pair}' in {}", dir.display())]
    ModelNotFound { pair: String, dir: PathBuf },

    #[error("The {0} partition is empty")]
    EmptyPartition(&'static str),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Column '{0}' is not present in the table")]
    IncompatibleColumns(String),

    #[error("Column '{column}' has a missing or non-finite value in {partition} row {row}")]
    NonFiniteValue {
        column: String,
        partition: &'static str,
        row: usize,
    },

    #[error("Label {0} is outside the down/neutral/up class space")]
    InvalidLabel(i64),

    #[error("Training failed for pairs: {}", pairs.join(", "))]
    TrainingFailed { pairs: Vec<String> },

    #[error("No feature row available for {0}")]
    NoFeatureRow(String),

    #[error("Feature error: {0}")]
    FeatureError(#[from] FeatureError),

    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Artifact encoding error: {0}")]
    BincodeError(#[from] bincode::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Plotting error: {0}")]
    PlotError(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
