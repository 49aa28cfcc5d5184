use feature_processing::misc::{DATE, NUM_CLASSES};
use log::{info, warn};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::misc::NON_FEATURE_COLUMNS;

/// Chronological partitions of a feature table.
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Array1<usize>,
    pub y_test: Array1<usize>,
}

/// Per-column standardization using the population standard deviation.
///
/// Columns with zero variance keep a scale of 1 so they pass through centred but unscaled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.scale.is_some()
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let mean = x.mean_axis(Axis(0)).ok_or(PipelineError::EmptyPartition("train"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(PipelineError::NotFitted);
        };
        if x.ncols() != mean.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: mean.len(),
                got: x.ncols(),
            });
        }
        Ok((x - mean) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Numeric model inputs of `df`: every numeric column that is not an identifier or a label.
pub fn select_feature_columns(df: &DataFrame, target_col: &str) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric())
        .map(|s| s.name().to_string())
        .filter(|name| name != target_col && !NON_FEATURE_COLUMNS.contains(&name.as_str()))
        .collect()
}

/// Row-major matrix of `columns`; missing cells become NaN.
pub fn frame_to_array(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut out = Array2::<f64>::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let series = df
            .column(name)
            .map_err(|_| PipelineError::IncompatibleColumns(name.clone()))?
            .cast(&DataType::Float64)?;
        for (i, value) in series.f64()?.into_iter().enumerate() {
            out[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }
    Ok(out)
}

/// Fails on the first NaN or infinite cell, naming its column.
pub fn ensure_finite(x: &Array2<f64>, columns: &[String], partition: &'static str) -> Result<()> {
    match x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, j), _)) => Err(PipelineError::NonFiniteValue {
            column: columns.get(j).cloned().unwrap_or_else(|| j.to_string()),
            partition,
            row,
        }),
        None => Ok(()),
    }
}

/// Encoded class ids of `target_col`.
pub fn target_vector(df: &DataFrame, target_col: &str) -> Result<Array1<usize>> {
    let series = df
        .column(target_col)
        .map_err(|_| PipelineError::IncompatibleColumns(target_col.to_string()))?
        .cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .map(|value| match value {
            Some(v) if (0..NUM_CLASSES as i64).contains(&v) => Ok(v as usize),
            Some(v) => Err(PipelineError::InvalidLabel(v)),
            None => Err(PipelineError::InvalidLabel(-1)),
        })
        .collect()
}

/// Splits a feature table by calendar year and standardizes it with train-only statistics.
#[derive(Debug)]
pub struct Preprocessor {
    df: DataFrame,
    target_col: String,
    test_year: i32,
    feature_columns: Option<Vec<String>>,
    scaler: StandardScaler,
}

impl Preprocessor {
    pub fn new(df: DataFrame, target_col: impl Into<String>, test_year: i32) -> Self {
        Self {
            df,
            target_col: target_col.into(),
            test_year,
            feature_columns: None,
            scaler: StandardScaler::new(),
        }
    }

    /// Columns chosen by the last `split`, in table order.
    pub fn feature_columns(&self) -> Option<&[String]> {
        self.feature_columns.as_deref()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Rows before `test_year` train, rows of `test_year` test, later rows are left out.
    pub fn split(&mut self) -> Result<SplitData> {
        let year = col(DATE).dt().year();
        let train = self
            .df
            .clone()
            .lazy()
            .filter(year.clone().lt(lit(self.test_year)))
            .collect()?;
        let test = self
            .df
            .clone()
            .lazy()
            .filter(year.eq(lit(self.test_year)))
            .collect()?;

        let excluded = self.df.height() - train.height() - test.height();
        if excluded > 0 {
            warn!(
                "{} rows fall outside both partitions (year after {} or no date) and are ignored",
                excluded, self.test_year
            );
        }
        if train.height() == 0 {
            return Err(PipelineError::EmptyPartition("train"));
        }
        if test.height() == 0 {
            return Err(PipelineError::EmptyPartition("test"));
        }

        let columns = select_feature_columns(&self.df, &self.target_col);
        let y_train = target_vector(&train, &self.target_col)?;
        let y_test = target_vector(&test, &self.target_col)?;
        let x_train = train.select(columns.iter().map(String::as_str))?;
        let x_test = test.select(columns.iter().map(String::as_str))?;

        info!(
            "Split: {} train rows, {} test rows, {} features",
            x_train.height(),
            x_test.height(),
            columns.len()
        );
        self.feature_columns = Some(columns);

        Ok(SplitData {
            x_train,
            x_test,
            y_train,
            y_test,
        })
    }

    /// Fits the scaler on `x_train` and applies it to both partitions.
    pub fn scale(&mut self, x_train: &DataFrame, x_test: &DataFrame) -> Result<(Array2<f64>, Array2<f64>)> {
        let columns = self.feature_columns.as_ref().ok_or(PipelineError::NotFitted)?;
        let train = frame_to_array(x_train, columns)?;
        let test = frame_to_array(x_test, columns)?;
        if train.nrows() == 0 {
            return Err(PipelineError::EmptyPartition("train"));
        }
        ensure_finite(&train, columns, "train")?;
        ensure_finite(&test, columns, "test")?;
        let train = self.scaler.fit_transform(&train)?;
        let test = self.scaler.transform(&test)?;
        Ok((train, test))
    }
}
