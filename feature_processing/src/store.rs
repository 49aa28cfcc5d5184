use data_ingestion::error::DataIngestionError;
use data_ingestion::storage::{list_versions_in, versioned_filename};
use log::info;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::FeatureError;

/// Versioned CSV snapshots of feature tables.
pub struct FeatureStore {
    preprocessed_dir: PathBuf,
}

impl FeatureStore {
    pub fn new(preprocessed_dir: impl Into<PathBuf>) -> Self {
        Self {
            preprocessed_dir: preprocessed_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.preprocessed_dir
    }

    /// `{name}_{YYYYMMDD_HHMMSS}.csv` when versioned, otherwise `{name}.csv`.
    pub fn save_features(&self, df: &DataFrame, name: &str, versioned: bool) -> Result<PathBuf, FeatureError> {
        fs::create_dir_all(&self.preprocessed_dir).map_err(DataIngestionError::from)?;
        let filename = if versioned {
            versioned_filename(name)
        } else {
            format!("{name}.csv")
        };
        let path = self.preprocessed_dir.join(filename);

        let mut file = File::create(&path).map_err(DataIngestionError::from)?;
        let mut df = df.clone();
        CsvWriter::new(&mut file).finish(&mut df)?;

        info!("Features saved to {}", path.display());
        Ok(path)
    }

    pub fn list_feature_versions(&self, name: &str) -> Result<Vec<String>, FeatureError> {
        Ok(list_versions_in(&self.preprocessed_dir, name)?)
    }

    pub fn load_latest_features(&self, name: &str) -> Result<DataFrame, FeatureError> {
        let latest = self
            .list_feature_versions(name)?
            .into_iter()
            .next()
            .ok_or_else(|| DataIngestionError::NoVersionsFound {
                name: name.to_string(),
                dir: self.preprocessed_dir.clone(),
            })?;
        info!("Loading latest version: {}", latest);
        self.load_specific_version(&latest)
    }

    pub fn load_specific_version(&self, filename: &str) -> Result<DataFrame, FeatureError> {
        let path = self.preprocessed_dir.join(filename);
        if !path.exists() {
            return Err(DataIngestionError::NoVersionsFound {
                name: filename.to_string(),
                dir: self.preprocessed_dir.clone(),
            }
            .into());
        }
        read_feature_csv(&path)
    }
}

/// Read a feature CSV, parsing ISO dates back into a `Date` column.
pub fn read_feature_csv(path: &Path) -> Result<DataFrame, FeatureError> {
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .with_try_parse_dates(true)
        .finish()?;
    Ok(df)
}
