use chrono::Local;
use feature_processing::misc::NUM_CLASSES;
use log::info;
use plotters::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::evaluator::EvaluationResult;

const CELL: i32 = 120;
const ORIGIN: (i32, i32) = (150, 90);

#[derive(Serialize)]
struct MetricRow<'a> {
    model: &'a str,
    balanced_accuracy: f64,
    f1_macro: f64,
}

#[derive(Serialize)]
struct PredictionRow<'a> {
    index: usize,
    actual: &'a str,
    predicted: &'a str,
}

/// Files describing one evaluation, written into a fresh `run_<timestamp>` directory.
pub struct EvaluationReport<'a> {
    result: &'a EvaluationResult,
}

impl<'a> EvaluationReport<'a> {
    pub fn new(result: &'a EvaluationResult) -> Self {
        Self { result }
    }

    /// Writes metrics, predictions and the confusion matrix (CSV and SVG) and returns the run directory.
    pub fn write(&self, test_runs_dir: &Path) -> Result<PathBuf> {
        let run_dir = create_run_dir(test_runs_dir)?;
        self.write_metrics(&run_dir)?;
        self.write_predictions(&run_dir.join("predictions.csv"))?;
        self.write_confusion_csv(&run_dir.join("confusion_matrix.csv"))?;
        self.draw_confusion_matrix(&run_dir.join("confusion_matrix.svg"))?;
        info!("Evaluation report written to {}", run_dir.display());
        Ok(run_dir)
    }

    fn write_metrics(&self, run_dir: &Path) -> Result<()> {
        let row = MetricRow {
            model: &self.result.model_id,
            balanced_accuracy: self.result.balanced_accuracy,
            f1_macro: self.result.f1_macro,
        };
        let mut writer = csv::Writer::from_path(run_dir.join("metrics.csv"))?;
        writer.serialize(&row)?;
        writer.flush()?;

        let file = File::create(run_dir.join("metrics.json"))?;
        serde_json::to_writer_pretty(file, self.result)?;
        Ok(())
    }

    fn label(&self, class: usize) -> &str {
        self.result
            .confusion_matrix
            .labels
            .get(class)
            .map(String::as_str)
            .unwrap_or("?")
    }

    fn write_predictions(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for (index, (&actual, &predicted)) in self
            .result
            .y_true
            .iter()
            .zip(&self.result.predictions)
            .enumerate()
        {
            writer.serialize(PredictionRow {
                index,
                actual: self.label(actual),
                predicted: self.label(predicted),
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_confusion_csv(&self, path: &Path) -> Result<()> {
        let cm = &self.result.confusion_matrix;
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["actual".to_string()];
        header.extend(cm.labels.iter().map(|l| format!("pred_{l}")));
        writer.write_record(&header)?;
        for (label, row) in cm.labels.iter().zip(&cm.counts) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(usize::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn draw_confusion_matrix(&self, path: &Path) -> Result<()> {
        self.render(path).map_err(|e| PipelineError::PlotError(e.to_string()))
    }

    fn render(&self, path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let cm = &self.result.confusion_matrix;
        let size = (
            (ORIGIN.0 + CELL * NUM_CLASSES as i32 + 40) as u32,
            (ORIGIN.1 + CELL * NUM_CLASSES as i32 + 60) as u32,
        );
        let root = SVGBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let max = cm.counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
        let title = ("sans-serif", 22).into_font();
        let label = ("sans-serif", 16).into_font();

        root.draw(&Text::new("Confusion Matrix - Test", (ORIGIN.0, 30), title))?;
        for (i, row) in cm.counts.iter().enumerate() {
            let y0 = ORIGIN.1 + CELL * i as i32;
            root.draw(&Text::new(
                self.label(i).to_string(),
                (20, y0 + CELL / 2),
                label.clone(),
            ))?;
            for (j, &count) in row.iter().enumerate() {
                let x0 = ORIGIN.0 + CELL * j as i32;
                let shade = 255 - (count as f64 / max * 200.0) as u8;
                let fill = RGBColor(shade, shade, 255);
                root.draw(&Rectangle::new([(x0, y0), (x0 + CELL, y0 + CELL)], fill.filled()))?;
                root.draw(&Rectangle::new([(x0, y0), (x0 + CELL, y0 + CELL)], BLACK))?;
                root.draw(&Text::new(
                    count.to_string(),
                    (x0 + CELL / 2 - 6, y0 + CELL / 2),
                    label.clone(),
                ))?;
            }
        }
        let bottom = ORIGIN.1 + CELL * NUM_CLASSES as i32 + 25;
        for j in 0..NUM_CLASSES {
            root.draw(&Text::new(
                self.label(j).to_string(),
                (ORIGIN.0 + CELL * j as i32 + 20, bottom),
                label.clone(),
            ))?;
        }
        root.draw(&Text::new("Actual", (20, ORIGIN.1 - 15), label.clone()))?;
        root.draw(&Text::new("Predicted", (ORIGIN.0, bottom + 25), label))?;
        root.present()?;
        Ok(())
    }
}

fn create_run_dir(test_runs_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(test_runs_dir)?;
    let stamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
    let mut candidate = test_runs_dir.join(format!("run_{stamp}"));
    let mut attempt = 1;
    while candidate.exists() {
        candidate = test_runs_dir.join(format!("run_{stamp}_{attempt}"));
        attempt += 1;
    }
    fs::create_dir(&candidate)?;
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ConfusionMatrix;
    use tempfile::tempdir;

    fn result() -> EvaluationResult {
        let labels: Vec<String> = ["Down", "Uncertain", "Up"].iter().map(|s| s.to_string()).collect();
        let y_true = vec![0, 1, 2, 2];
        let predictions = vec![0, 1, 1, 2];
        let confusion_matrix = ConfusionMatrix::from_predictions(&y_true, &predictions, &labels).unwrap();
        EvaluationResult {
            model_id: "model_eurgbp_20240101_000000_000000".to_string(),
            balanced_accuracy: confusion_matrix.balanced_accuracy(),
            f1_macro: confusion_matrix.f1_macro(),
            confusion_matrix,
            y_true,
            predictions,
        }
    }

    #[test]
    fn writes_every_report_file() {
        let dir = tempdir().unwrap();
        let result = result();
        let run_dir = EvaluationReport::new(&result).write(dir.path()).unwrap();

        for name in [
            "metrics.csv",
            "metrics.json",
            "predictions.csv",
            "confusion_matrix.csv",
            "confusion_matrix.svg",
        ] {
            assert!(run_dir.join(name).exists(), "{name} missing");
        }

        let confusion = fs::read_to_string(run_dir.join("confusion_matrix.csv")).unwrap();
        assert_eq!(
            confusion.lines().collect::<Vec<_>>(),
            vec![
                "actual,pred_Down,pred_Uncertain,pred_Up",
                "Down,1,0,0",
                "Uncertain,0,1,0",
                "Up,0,1,1",
            ]
        );
        let svg = fs::read_to_string(run_dir.join("confusion_matrix.svg")).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Confusion Matrix - Test"));
    }

    #[test]
    fn runs_in_the_same_second_get_distinct_directories() {
        let dir = tempdir().unwrap();
        let result = result();
        let first = EvaluationReport::new(&result).write(dir.path()).unwrap();
        let second = EvaluationReport::new(&result).write(dir.path()).unwrap();
        assert_ne!(first, second);
    }
}
