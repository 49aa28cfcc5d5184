use config;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataIngestionError {
    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Config not found: {0}")]
    ConfigValueNotFoundError(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Upstream response is missing '{key}'. Check the API key or request parameters")]
    UpstreamSchemaError { key: String },

    #[error("Malformed value for {field} on {date}: {value}")]
    MalformedValue {
        date: String,
        field: &'static str,
        value: String,
    },

    #[error("No stored versions of '{name}' in {}", dir.display())]
    NoVersionsFound { name: String, dir: PathBuf },

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),
}
