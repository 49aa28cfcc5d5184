use data_ingestion::config::{AppConfig, StorageConfig, TrainingConfig};
use feature_processing::misc::TARGET_ENCODED;
use log::{debug, error, info};
use polars::prelude::DataFrame;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;

use crate::classifier::{Classifier, SoftmaxRegression};
use crate::error::{PipelineError, Result};
use crate::evaluator::{self, EvaluationResult};
use crate::misc::RunMetrics;
use crate::preprocessor::Preprocessor;
use crate::report::EvaluationReport;
use crate::trainer::{ModelTrainer, SavedArtifact};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    Split,
    Scale,
    Train,
    Save,
    Evaluate,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::Split => "split",
            PipelineStage::Scale => "scale",
            PipelineStage::Train => "train",
            PipelineStage::Save => "save",
            PipelineStage::Evaluate => "evaluate",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub metrics: RunMetrics,
    pub evaluation: EvaluationResult,
    pub artifact: SavedArtifact,
    pub report_dir: Option<PathBuf>,
}

/// Runs split, scale, train, save and evaluate over one feature table.
///
/// Any stage error moves the runner to [`PipelineStage::Failed`] and is returned unchanged.
/// Artifacts written by the save stage stay on disk if evaluation fails afterwards.
pub struct PipelineRunner<C = SoftmaxRegression> {
    df: DataFrame,
    training: TrainingConfig,
    storage: StorageConfig,
    model: C,
    write_report: bool,
    stage: PipelineStage,
}

impl PipelineRunner<SoftmaxRegression> {
    pub fn new(df: DataFrame, config: &AppConfig) -> Self {
        let t = &config.training;
        let model = SoftmaxRegression::new(t.learning_rate, t.max_iter, t.tolerance, t.l2_penalty);
        Self::with_model(df, config, model)
    }
}

impl<C> PipelineRunner<C>
where
    C: Classifier + Clone + Serialize + DeserializeOwned,
{
    pub fn with_model(df: DataFrame, config: &AppConfig, model: C) -> Self {
        Self {
            df,
            training: config.training.clone(),
            storage: config.storage.clone(),
            model,
            write_report: true,
            stage: PipelineStage::Init,
        }
    }

    /// Skip the run directory under `test_runs_dir`.
    pub fn without_report(mut self) -> Self {
        self.write_report = false;
        self
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn run(&mut self) -> Result<PipelineOutcome> {
        if self.stage != PipelineStage::Init {
            info!("Restarting pipeline from {}", self.stage);
            self.stage = PipelineStage::Init;
        }
        match self.execute() {
            Ok(outcome) => {
                self.stage = PipelineStage::Done;
                info!(
                    "Pipeline done: {} balanced accuracy {:.4}, F1 macro {:.4}",
                    outcome.metrics.model_name, outcome.metrics.balanced_accuracy, outcome.metrics.f1_macro
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Pipeline failed during {}: {}", self.stage, e);
                self.stage = PipelineStage::Failed;
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn execute(&mut self) -> Result<PipelineOutcome> {
        self.enter(PipelineStage::Split);
        let mut preprocessor = Preprocessor::new(self.df.clone(), TARGET_ENCODED, self.training.test_year);
        let split = preprocessor.split()?;

        self.enter(PipelineStage::Scale);
        let (x_train, x_test) = preprocessor.scale(&split.x_train, &split.x_test)?;
        let feature_names = preprocessor
            .feature_columns()
            .ok_or(PipelineError::NotFitted)?
            .to_vec();

        self.enter(PipelineStage::Train);
        let mut trainer = ModelTrainer::new(self.model.clone(), self.storage.model_dir.clone());
        let model = trainer.train(&x_train, &split.y_train)?;

        self.enter(PipelineStage::Save);
        let artifact = trainer.save(&model, preprocessor.scaler(), &feature_names, &self.training.pair)?;

        self.enter(PipelineStage::Evaluate);
        let evaluation = evaluator::evaluate(
            &artifact.model_id,
            &model,
            &x_test,
            &split.y_test,
            &self.training.label_names,
        )?;
        let report_dir = if self.write_report {
            Some(EvaluationReport::new(&evaluation).write(&self.storage.test_runs_dir)?)
        } else {
            None
        };

        let metrics = RunMetrics {
            model_name: artifact.model_id.clone(),
            balanced_accuracy: evaluation.balanced_accuracy,
            f1_macro: evaluation.f1_macro,
        };
        Ok(PipelineOutcome {
            metrics,
            evaluation,
            artifact,
            report_dir,
        })
    }
}
