use data_ingestion::error::DataIngestionError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Required column '{0}' not found in the input table")]
    MissingColumn(String),

    #[error("No rows left after cleaning ({dropped} rows dropped)")]
    EmptyFeatureSet { dropped: usize },

    #[error("Column '{column}' has unsupported type {dtype}")]
    InvalidColumnType { column: String, dtype: String },

    #[error("Dates must be unique and ascending; violated at row {index}")]
    UnorderedDates { index: usize },

    #[error("Missing date at row {index}")]
    NullDate { index: usize },

    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("Storage error: {0}")]
    StorageError(#[from] DataIngestionError),
}
