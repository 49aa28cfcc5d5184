use anyhow::Result;
use chrono::{Duration, NaiveDate};
use data_ingestion::{AppConfig, PriceRow};
use feature_processing::misc::TARGET_ENCODED;
use feature_processing::{Direction, FeatureEngineer, price_frame};
use model_pipeline::preprocessor::frame_to_array;
use model_pipeline::{
    Classifier, ModelTrainer, PipelineError, PipelineRunner, PipelineStage, Predictor, Preprocessor,
    SoftmaxRegression, evaluate,
};
use ndarray::{Array1, Array2, Axis, array};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::{TempDir, tempdir};

fn sinusoid(n: usize) -> Vec<PriceRow> {
    let start = NaiveDate::from_ymd_opt(2023, 9, 15).unwrap();
    let price = |t: usize| 0.85 + 0.01 * (2.0 * std::f64::consts::PI * t as f64 / 20.0).sin();
    (0..n)
        .map(|t| {
            let close = price(t);
            let open = if t == 0 { close } else { price(t - 1) };
            PriceRow {
                date: start + Duration::days(t as i64),
                open,
                high: open.max(close) + 0.001,
                low: open.min(close) - 0.001,
                close,
                volume: None,
            }
        })
        .collect()
}

fn features() -> Result<DataFrame> {
    let raw = price_frame(&sinusoid(120))?;
    Ok(FeatureEngineer::new().compute_features(&raw, "date")?)
}

fn config(dir: &TempDir) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.model_dir = dir.path().join("model");
    cfg.storage.test_runs_dir = dir.path().join("test_runs");
    cfg
}

fn artifact_count(model_dir: &Path) -> usize {
    std::fs::read_dir(model_dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Predicts the neutral class for every row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AlwaysNeutral;

impl Classifier for AlwaysNeutral {
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<usize>) -> model_pipeline::error::Result<()> {
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> model_pipeline::error::Result<Array1<usize>> {
        Ok(Array1::from_elem(x.nrows(), Direction::Neutral.index()))
    }

    fn name(&self) -> &str {
        "AlwaysNeutral"
    }
}

#[test]
fn full_run_trains_saves_and_reports() -> Result<()> {
    let dir = tempdir()?;
    let cfg = config(&dir);
    let mut runner = PipelineRunner::new(features()?, &cfg);

    let outcome = runner.run()?;
    assert_eq!(runner.stage(), PipelineStage::Done);
    assert_eq!(outcome.metrics.model_name, outcome.artifact.model_id);
    assert!((0.0..=1.0).contains(&outcome.metrics.balanced_accuracy));
    assert!((0.0..=1.0).contains(&outcome.metrics.f1_macro));
    assert_eq!(outcome.evaluation.confusion_matrix.total(), 11);
    assert_eq!(outcome.evaluation.predictions.len(), 11);

    assert!(outcome.artifact.path.exists());
    assert!(outcome.artifact.model_id.starts_with("model_eurgbp_"));
    let report_dir = outcome.report_dir.expect("report directory");
    assert!(report_dir.join("metrics.json").exists());
    assert!(report_dir.join("confusion_matrix.svg").exists());
    Ok(())
}

#[test]
fn splitting_twice_gives_the_same_partitions() -> Result<()> {
    let mut pre = Preprocessor::new(features()?, TARGET_ENCODED, 2024);
    let first = pre.split()?;
    let second = pre.split()?;
    assert!(first.x_train.equals(&second.x_train));
    assert!(first.x_test.equals(&second.x_test));
    assert_eq!(first.y_train, second.y_train);
    assert_eq!(first.y_test, second.y_test);

    assert_eq!(first.x_train.height(), 19);
    assert_eq!(first.x_test.height(), 11);
    let columns = pre.feature_columns().unwrap();
    assert!(!columns.iter().any(|c| c == "return_t1" || c == "target_encoded"));
    assert!(columns.iter().any(|c| c == "RSI"));
    Ok(())
}

#[test]
fn scaled_train_columns_are_standardized() -> Result<()> {
    let mut pre = Preprocessor::new(features()?, TARGET_ENCODED, 2024);
    let split = pre.split()?;
    let (x_train, x_test) = pre.scale(&split.x_train, &split.x_test)?;
    assert_eq!(x_test.nrows(), 11);

    let means = x_train.mean_axis(Axis(0)).unwrap();
    let stds = x_train.std_axis(Axis(0), 0.0);
    for (m, s) in means.iter().zip(stds.iter()) {
        assert!(m.abs() < 1e-9);
        // constant columns (the December month, for instance) stay at zero spread
        assert!((s - 1.0).abs() < 1e-9 || s.abs() < 1e-12);
    }

    let raw_train = frame_to_array(&split.x_train, pre.feature_columns().unwrap())?;
    assert_eq!(pre.scaler().transform(&raw_train)?, x_train);
    Ok(())
}

#[test]
fn latest_artifact_is_the_last_one_saved() -> Result<()> {
    let dir = tempdir()?;
    let mut trainer = ModelTrainer::new(SoftmaxRegression::default(), dir.path());
    let mut pre = Preprocessor::new(features()?, TARGET_ENCODED, 2024);
    let split = pre.split()?;
    let (x_train, _) = pre.scale(&split.x_train, &split.x_test)?;
    let model = trainer.train(&x_train, &split.y_train)?;
    let columns = pre.feature_columns().unwrap().to_vec();

    let first = trainer.save(&model, pre.scaler(), &columns, "eurgbp")?;
    let second = trainer.save(&model, pre.scaler(), &columns, "eurgbp")?;
    assert!(second.version > first.version);
    assert!(first.path.exists() && second.path.exists());

    let loaded = trainer.load_latest("eurgbp")?;
    assert_eq!(loaded.version, second.version);
    assert_eq!(loaded.feature_names, columns);
    Ok(())
}

#[test]
fn always_neutral_scores_one_third_balanced_accuracy() -> Result<()> {
    let labels: Vec<String> = AppConfig::default().training.label_names;
    let x = Array2::zeros((6, 2));
    let y = array![0, 0, 1, 1, 1, 2];
    let result = evaluate("constant", &AlwaysNeutral, &x, &y, &labels)?;

    assert_eq!(result.confusion_matrix.counts, [[0, 2, 0], [0, 3, 0], [0, 1, 0]]);
    assert!((result.balanced_accuracy - 1.0 / 3.0).abs() < 1e-12);
    assert!((result.f1_macro - 2.0 / 9.0).abs() < 1e-12);
    assert_eq!(result.predictions, vec![1; 6]);
    Ok(())
}

#[test]
fn failure_after_save_keeps_the_artifact() -> Result<()> {
    let dir = tempdir()?;
    let mut cfg = config(&dir);
    cfg.training.label_names = vec!["Down".to_string(), "Up".to_string()];
    let mut runner = PipelineRunner::with_model(features()?, &cfg, AlwaysNeutral);

    let err = runner.run().unwrap_err();
    assert!(matches!(err, PipelineError::DimensionMismatch { expected: 3, got: 2 }));
    assert_eq!(runner.stage(), PipelineStage::Failed);
    assert_eq!(artifact_count(&cfg.storage.model_dir), 1);
    assert_eq!(artifact_count(&cfg.storage.test_runs_dir), 0);
    Ok(())
}

#[test]
fn failure_before_save_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let mut cfg = config(&dir);
    cfg.training.test_year = 2030;
    let mut runner = PipelineRunner::new(features()?, &cfg);

    let err = runner.run().unwrap_err();
    assert!(matches!(err, PipelineError::EmptyPartition("test")));
    assert_eq!(runner.stage(), PipelineStage::Failed);
    assert_eq!(artifact_count(&cfg.storage.model_dir), 0);
    Ok(())
}

#[test]
fn predictor_scores_the_newest_unlabelled_day() -> Result<()> {
    let dir = tempdir()?;
    let cfg = config(&dir);
    let outcome = PipelineRunner::new(features()?, &cfg).without_report().run()?;

    let prices = price_frame(&sinusoid(120))?;
    let mut predictor = Predictor::load_latest(&cfg.storage.model_dir, "eurgbp", SoftmaxRegression::default())?;
    assert_eq!(predictor.model_id(), outcome.artifact.model_id);

    let latest = predictor.predict(&prices, "date", None)?;
    assert_eq!(latest.date, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
    let probabilities = latest.probabilities.unwrap();
    assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);

    let earlier = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    assert_eq!(predictor.predict(&prices, "date", Some(earlier))?.date, earlier);

    let missing = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    assert!(matches!(
        predictor.predict(&prices, "date", Some(missing)),
        Err(PipelineError::NoFeatureRow(_))
    ));
    Ok(())
}

#[test]
fn blank_train_cell_fails_the_run_before_training() -> Result<()> {
    let dir = tempdir()?;
    let cfg = config(&dir);
    let mut df = features()?;
    let mut rsi: Vec<Option<f64>> = df.column("RSI")?.f64()?.into_iter().collect();
    rsi[3] = None;
    df.with_column(Series::new("RSI", rsi))?;

    let mut runner = PipelineRunner::new(df, &cfg);
    match runner.run() {
        Err(PipelineError::NonFiniteValue { column, partition, row }) => {
            assert_eq!(column, "RSI");
            assert_eq!(partition, "train");
            assert_eq!(row, 3);
        }
        other => panic!("expected NonFiniteValue, got {:?}", other.map(|o| o.metrics)),
    }
    assert_eq!(runner.stage(), PipelineStage::Failed);
    assert_eq!(artifact_count(&cfg.storage.model_dir), 0);
    Ok(())
}
