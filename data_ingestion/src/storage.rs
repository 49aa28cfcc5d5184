use chrono::Local;
use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DataIngestionError;

/// Timestamp suffix for versioned files. Sorts correctly as text.
pub const VERSION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `{name}_{YYYYMMDD_HHMMSS}.csv`
pub fn versioned_filename(name: &str) -> String {
    format!("{}_{}.csv", name, Local::now().format(VERSION_FORMAT))
}

/// Files in `dir` whose name starts with `name` and ends in `.csv`, newest first.
pub fn list_versions_in(dir: &Path, name: &str) -> Result<Vec<String>, DataIngestionError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|file| file.starts_with(name) && file.ends_with(".csv"))
        .collect();
    files.sort_by(|a, b| b.cmp(a));
    Ok(files)
}

/// Append-only CSV store for raw daily series.
pub struct RawDataStore {
    root: PathBuf,
}

impl RawDataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store<T: Serialize>(&self, rows: &[T], name: &str) -> Result<PathBuf, DataIngestionError> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(versioned_filename(name));

        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        info!("Stored {} rows in {}", rows.len(), path.display());
        Ok(path)
    }

    pub fn list_versions(&self, name: &str) -> Result<Vec<String>, DataIngestionError> {
        list_versions_in(&self.root, name)
    }

    pub fn load_latest<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, DataIngestionError> {
        let latest = self
            .list_versions(name)?
            .into_iter()
            .next()
            .ok_or_else(|| DataIngestionError::NoVersionsFound {
                name: name.to_string(),
                dir: self.root.clone(),
            })?;
        info!("Loading latest version: {}", latest);
        self.load_version(&latest)
    }

    pub fn load_version<T: DeserializeOwned>(&self, filename: &str) -> Result<Vec<T>, DataIngestionError> {
        let mut reader = csv::Reader::from_path(self.root.join(filename))?;
        let rows = reader.deserialize().collect::<Result<Vec<T>, csv::Error>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::PriceRow;
    use chrono::NaiveDate;

    fn rows() -> Vec<PriceRow> {
        (1..=3)
            .map(|d| PriceRow {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                open: 1.0,
                high: 1.1,
                low: 0.9,
                close: 1.0 + d as f64 / 100.0,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn store_and_load_latest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RawDataStore::new(dir.path());
        let path = store.store(&rows(), "eur_gbp_daily").unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("eur_gbp_daily_"));

        let loaded: Vec<PriceRow> = store.load_latest("eur_gbp_daily").unwrap();
        assert_eq!(loaded, rows());
    }

    #[test]
    fn versions_are_listed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20240101_000000", "20240301_120000", "20240201_000000"] {
            fs::write(dir.path().join(format!("forex_raw_{stamp}.csv")), "date\n").unwrap();
        }
        fs::write(dir.path().join("other_20250101_000000.csv"), "date\n").unwrap();

        let store = RawDataStore::new(dir.path());
        let versions = store.list_versions("forex_raw").unwrap();
        assert_eq!(
            versions,
            vec![
                "forex_raw_20240301_120000.csv",
                "forex_raw_20240201_000000.csv",
                "forex_raw_20240101_000000.csv",
            ]
        );
    }

    #[test]
    fn load_latest_without_versions_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = RawDataStore::new(dir.path());
        let err = store.load_latest::<PriceRow>("forex_raw").unwrap_err();
        assert!(matches!(err, DataIngestionError::NoVersionsFound { .. }));
    }
}
