use data_ingestion::config::TrainingConfig;
use log::{error, info};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classifier::{Classifier, SoftmaxRegression};
use crate::error::{PipelineError, Result};
use crate::preprocessor::StandardScaler;
use crate::registry::{ArtifactRegistry, VersionId};

/// Everything needed to score new rows: the fitted model, its scaler and input column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact<C> {
    pub pair: String,
    pub version: VersionId,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub model: C,
}

impl<C> ModelArtifact<C> {
    pub fn model_id(&self) -> String {
        ArtifactRegistry::artifact_name(&self.pair, self.version)
    }
}

#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub version: VersionId,
    pub model_id: String,
}

/// Inputs for one pair in a multi-pair run.
#[derive(Debug, Clone)]
pub struct PairDataset {
    pub x: Array2<f64>,
    pub y: Array1<usize>,
}

/// Fitted models per pair and the pairs that failed.
#[derive(Debug)]
pub struct MultiPairOutcome<C> {
    pub models: BTreeMap<String, C>,
    pub failures: BTreeMap<String, PipelineError>,
}

/// Fits a classifier and persists versioned artifacts for it.
#[derive(Debug, Clone)]
pub struct ModelTrainer<C = SoftmaxRegression> {
    model: C,
    registry: ArtifactRegistry,
}

impl ModelTrainer<SoftmaxRegression> {
    pub fn from_config(model_dir: impl Into<PathBuf>, training: &TrainingConfig) -> Self {
        let model = SoftmaxRegression::new(
            training.learning_rate,
            training.max_iter,
            training.tolerance,
            training.l2_penalty,
        );
        Self::new(model, model_dir)
    }
}

impl<C> ModelTrainer<C>
where
    C: Classifier + Clone + Serialize + DeserializeOwned,
{
    pub fn new(model: C, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            registry: ArtifactRegistry::new(model_dir),
        }
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Fits the configured classifier and hands back the fitted copy.
    pub fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<usize>) -> Result<C> {
        info!("Training {} on {} samples", self.model.name(), x_train.nrows());
        self.model.fit(x_train, y_train)?;
        Ok(self.model.clone())
    }

    /// Writes a new artifact; existing files are never overwritten.
    pub fn save(
        &self,
        model: &C,
        scaler: &StandardScaler,
        feature_names: &[String],
        pair: &str,
    ) -> Result<SavedArtifact> {
        fs::create_dir_all(self.registry.root())?;
        let version = self.registry.next_version(pair)?;
        let path = self.registry.artifact_path(pair, version);

        let artifact = ModelArtifact {
            pair: pair.to_string(),
            version,
            feature_names: feature_names.to_vec(),
            scaler: scaler.clone(),
            model: model.clone(),
        };
        let writer = BufWriter::new(File::create_new(&path)?);
        if let Err(e) = write_artifact(writer, &artifact) {
            error!("Discarding partial artifact {}: {}", path.display(), e);
            if let Err(remove) = fs::remove_file(&path) {
                error!("Could not remove {}: {}", path.display(), remove);
            }
            return Err(e);
        }

        let model_id = artifact.model_id();
        info!("Model saved: {}", path.display());
        Ok(SavedArtifact {
            path,
            version,
            model_id,
        })
    }

    pub fn load_latest(&self, pair: &str) -> Result<ModelArtifact<C>> {
        let (_, path) = self
            .registry
            .latest(pair)?
            .ok_or_else(|| PipelineError::ModelNotFound {
                pair: pair.to_string(),
                dir: self.registry.root().to_path_buf(),
            })?;
        load_artifact(&path)
    }
}

fn write_artifact<W: Write, C: Serialize>(mut writer: W, artifact: &ModelArtifact<C>) -> Result<()> {
    bincode::serialize_into(&mut writer, artifact)?;
    writer.flush()?;
    Ok(())
}

pub fn load_artifact<C: DeserializeOwned>(path: &Path) -> Result<ModelArtifact<C>> {
    let reader = BufReader::new(File::open(path)?);
    let artifact = bincode::deserialize_from(reader)?;
    info!("Model loaded: {}", path.display());
    Ok(artifact)
}

/// Fits one fresh model per pair in parallel.
///
/// Failures are collected per pair; with `strict` any failure turns the whole run into
/// [`PipelineError::TrainingFailed`].
pub fn train_pairs<C, F>(
    datasets: &BTreeMap<String, PairDataset>,
    factory: F,
    strict: bool,
) -> Result<MultiPairOutcome<C>>
where
    C: Classifier + Send,
    F: Fn() -> C + Sync,
{
    let results: Vec<(String, Result<C>)> = datasets
        .par_iter()
        .map(|(pair, data)| {
            let mut model = factory();
            let fitted = model.fit(&data.x, &data.y).map(|_| model);
            (pair.clone(), fitted)
        })
        .collect();

    let mut outcome = MultiPairOutcome {
        models: BTreeMap::new(),
        failures: BTreeMap::new(),
    };
    for (pair, result) in results {
        match result {
            Ok(model) => {
                info!("{}: model trained", pair);
                outcome.models.insert(pair, model);
            }
            Err(e) => {
                error!("{}: training failed: {}", pair, e);
                outcome.failures.insert(pair, e);
            }
        }
    }

    if strict && !outcome.failures.is_empty() {
        return Err(PipelineError::TrainingFailed {
            pairs: outcome.failures.keys().cloned().collect(),
        });
    }
    Ok(outcome)
}
