use chrono::NaiveDate;
use feature_processing::misc::DATE;
use feature_processing::{Direction, FeatureEngineer};
use log::info;
use ndarray::Array2;
use polars::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use crate::classifier::{Classifier, SoftmaxRegression};
use crate::error::{PipelineError, Result};
use crate::misc::Prediction;
use crate::preprocessor::{ensure_finite, frame_to_array};
use crate::trainer::{ModelArtifact, ModelTrainer};

/// Scores fresh price history with the newest stored artifact of a pair.
pub struct Predictor<C = SoftmaxRegression> {
    artifact: ModelArtifact<C>,
    engineer: FeatureEngineer,
}

impl<C> Predictor<C>
where
    C: Classifier + Clone + Serialize + DeserializeOwned,
{
    pub fn new(artifact: ModelArtifact<C>) -> Self {
        Self {
            artifact,
            engineer: FeatureEngineer::new(),
        }
    }

    pub fn load_latest(model_dir: impl Into<PathBuf>, pair: &str, model: C) -> Result<Self> {
        let trainer = ModelTrainer::new(model, model_dir);
        Ok(Self::new(trainer.load_latest(pair)?))
    }

    pub fn model_id(&self) -> String {
        self.artifact.model_id()
    }

    /// Direction for `on`, or for the newest day with complete features when `on` is `None`.
    pub fn predict(&mut self, prices: &DataFrame, date_column: &str, on: Option<NaiveDate>) -> Result<Prediction> {
        let features = self.engineer.compute_inference_features(prices, date_column)?;
        let dates: Vec<Option<NaiveDate>> = features.column(DATE)?.date()?.as_date_iter().collect();

        let row = match on {
            Some(day) => dates
                .iter()
                .position(|d| *d == Some(day))
                .ok_or_else(|| PipelineError::NoFeatureRow(day.to_string()))?,
            None => dates
                .len()
                .checked_sub(1)
                .ok_or_else(|| PipelineError::NoFeatureRow("the latest day".to_string()))?,
        };
        let date = dates[row].ok_or_else(|| PipelineError::NoFeatureRow(format!("row {row}")))?;

        let single = features.slice(row as i64, 1);
        let x = self.inputs(&single)?;
        let class = self.artifact.model.predict(&x)?[0];
        let direction = Direction::from_index(class).ok_or(PipelineError::InvalidLabel(class as i64))?;
        let probabilities = self
            .artifact
            .model
            .predict_proba(&x)?
            .map(|p| [p[[0, 0]], p[[0, 1]], p[[0, 2]]]);

        info!("{}: {} ({})", date, direction, self.model_id());
        Ok(Prediction {
            date,
            direction,
            model_id: self.model_id(),
            probabilities,
        })
    }

    fn inputs(&self, row: &DataFrame) -> Result<Array2<f64>> {
        let raw = frame_to_array(row, &self.artifact.feature_names)?;
        ensure_finite(&raw, &self.artifact.feature_names, "inference")?;
        self.artifact.scaler.transform(&raw)
    }
}
