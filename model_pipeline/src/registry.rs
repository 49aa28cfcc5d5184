use chrono::{NaiveDateTime, SubsecRound, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const ARTIFACT_EXTENSION: &str = "bin";

/// Microsecond UTC timestamp rendered as `YYYYMMDD_HHMMSS_ffffff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionId(NaiveDateTime);

impl VersionId {
    pub fn now() -> Self {
        VersionId(Utc::now().naive_utc().trunc_subsecs(6))
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        VersionId(at.trunc_subsecs(6))
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (stamp, micros) = text.rsplit_once('_')?;
        if micros.len() != 6 {
            return None;
        }
        let micros: i64 = micros.parse().ok()?;
        let base = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
        Some(VersionId(base + TimeDelta::microseconds(micros)))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    fn successor(self) -> Self {
        VersionId(self.0 + TimeDelta::microseconds(1))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:06}", self.0.format(STAMP_FORMAT), self.0.nanosecond() / 1_000)
    }
}

/// Directory of `model_{pair}_{version}.bin` files.
#[derive(Debug, Clone)]
pub struct ArtifactRegistry {
    root: PathBuf,
}

impl ArtifactRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_name(pair: &str, version: VersionId) -> String {
        format!("model_{pair}_{version}")
    }

    pub fn artifact_path(&self, pair: &str, version: VersionId) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::artifact_name(pair, version), ARTIFACT_EXTENSION))
    }

    /// Versions stored for `pair`, oldest first. Files with unparseable names are skipped.
    pub fn versions(&self, pair: &str) -> Result<Vec<VersionId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("model_{pair}_");
        let suffix = format!(".{ARTIFACT_EXTENSION}");
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(version) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .and_then(VersionId::parse)
            {
                versions.push(version);
            }
        }
        versions.sort();
        Ok(versions)
    }

    pub fn latest(&self, pair: &str) -> Result<Option<(VersionId, PathBuf)>> {
        Ok(self
            .versions(pair)?
            .pop()
            .map(|version| (version, self.artifact_path(pair, version))))
    }

    /// A version strictly newer than every stored one, normally the current time.
    pub fn next_version(&self, pair: &str) -> Result<VersionId> {
        let now = VersionId::now();
        Ok(match self.versions(pair)?.last() {
            Some(&latest) if latest >= now => latest.successor(),
            _ => now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(micros: u32) -> VersionId {
        VersionId::from_datetime(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_micro_opt(9, 30, 5, micros)
                .unwrap(),
        )
    }

    #[test]
    fn display_and_parse_agree() {
        let version = at(42);
        assert_eq!(version.to_string(), "20240301_093005_000042");
        assert_eq!(VersionId::parse("20240301_093005_000042"), Some(version));
        assert_eq!(VersionId::parse("20240301_093005"), None);
    }

    #[test]
    fn latest_is_chosen_by_version_not_listing_order() {
        let dir = tempdir().unwrap();
        let registry = ArtifactRegistry::new(dir.path());
        for version in [at(7), at(900_000), at(3)] {
            fs::write(registry.artifact_path("eurgbp", version), b"x").unwrap();
        }
        fs::write(dir.path().join("model_eurgbp_garbage.bin"), b"x").unwrap();
        fs::write(registry.artifact_path("usdjpy", at(999_999)), b"x").unwrap();

        assert_eq!(registry.versions("eurgbp").unwrap().len(), 3);
        let (latest, path) = registry.latest("eurgbp").unwrap().unwrap();
        assert_eq!(latest, at(900_000));
        assert!(path.ends_with("model_eurgbp_20240301_093005_900000.bin"));
    }

    #[test]
    fn next_version_moves_past_future_stamps() {
        let dir = tempdir().unwrap();
        let registry = ArtifactRegistry::new(dir.path());
        let future = VersionId::from_datetime(
            NaiveDate::from_ymd_opt(2999, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        );
        fs::write(registry.artifact_path("eurgbp", future), b"x").unwrap();
        let next = registry.next_version("eurgbp").unwrap();
        assert!(next > future);
        assert_eq!(next.to_string(), "29990101_000000_000001");
    }

    #[test]
    fn missing_directory_has_no_versions() {
        let registry = ArtifactRegistry::new("/nonexistent/model/dir");
        assert!(registry.latest("eurgbp").unwrap().is_none());
    }
}
