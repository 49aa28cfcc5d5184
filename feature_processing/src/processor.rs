use chrono::NaiveDate;
use data_ingestion::fetcher::PriceRow;
use log::{debug, info, warn};
use polars::prelude::*;

use crate::error::FeatureError;
use crate::indicators::{self, CalendarFeatures};
use crate::misc::{
    CLOSE, DATE, Direction, HIGH, LOW, OPEN, REQUIRED_PRICE_COLUMNS, RETURN_T1, TARGET,
    TARGET_ENCODED, TECHNICAL_FEATURES, TEMPORAL_FEATURES, VOLUME,
};

const SMA_SHORT: usize = 30;
const SMA_LONG: usize = 90;
const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const VOLATILITY_LONG: usize = 30;
const VOLATILITY_SHORT: usize = 10;
const VOLUME_MEAN_WINDOW: usize = 30;
const VOLUME_TREND_WINDOW: usize = 5;

/// Build a raw price table (`date, open, high, low, close[, volume]`) from rows.
///
/// `volume` is only emitted when at least one row carries it.
pub fn price_frame(rows: &[PriceRow]) -> PolarsResult<DataFrame> {
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    let mut columns = vec![
        Series::new(DATE, dates),
        Series::new(OPEN, rows.iter().map(|r| r.open).collect::<Vec<f64>>()),
        Series::new(HIGH, rows.iter().map(|r| r.high).collect::<Vec<f64>>()),
        Series::new(LOW, rows.iter().map(|r| r.low).collect::<Vec<f64>>()),
        Series::new(CLOSE, rows.iter().map(|r| r.close).collect::<Vec<f64>>()),
    ];
    if rows.iter().any(|r| r.volume.is_some()) {
        columns.push(Series::new(
            VOLUME,
            rows.iter().map(|r| r.volume).collect::<Vec<Option<f64>>>(),
        ));
    }
    DataFrame::new(columns)
}

fn trailing(window: usize) -> RollingOptions {
    RollingOptions {
        window_size: Duration::parse(&format!("{window}i")),
        min_periods: window,
        ..Default::default()
    }
}

fn column_with_nans(df: &DataFrame, name: &str) -> Result<Vec<f64>, FeatureError> {
    let series = df
        .column(name)
        .map_err(|_| FeatureError::MissingColumn(name.to_string()))?;
    if !series.dtype().is_numeric() {
        return Err(FeatureError::InvalidColumnType {
            column: name.to_string(),
            dtype: series.dtype().to_string(),
        });
    }
    let series = series.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

fn date_column(df: &DataFrame) -> Result<Vec<NaiveDate>, FeatureError> {
    let series = df.column(DATE)?;
    series
        .date()?
        .as_date_iter()
        .enumerate()
        .map(|(index, date)| date.ok_or(FeatureError::NullDate { index }))
        .collect()
}

/// Derives technical, temporal and target columns from a daily OHLC table.
///
/// Stateless apart from remembering the feature list of the last run.
#[derive(Debug, Default)]
pub struct FeatureEngineer {
    feature_columns: Vec<String>,
}

impl FeatureEngineer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stable, exhaustive list of model feature columns.
    pub fn get_feature_columns() -> Vec<String> {
        TECHNICAL_FEATURES
            .iter()
            .chain(TEMPORAL_FEATURES.iter())
            .map(|name| name.to_string())
            .collect()
    }

    /// Feature columns of the last computed table (empty before any run).
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Full derivation plus cleaning: rows missing any feature or the target are dropped.
    pub fn compute_features(&mut self, df: &DataFrame, date_column: &str) -> Result<DataFrame, FeatureError> {
        info!(
            "Starting feature engineering: {} rows, {} columns",
            df.height(),
            df.width()
        );
        debug!("Available columns: {:?}", df.get_column_names());

        let derived = self.derive(df, date_column)?;

        let mut required = self.feature_columns.clone();
        required.push(TARGET_ENCODED.to_string());
        let cleaned = clean(derived, &required)?;

        info!("Total features created: {}", self.feature_columns.len());
        for (label, count, pct) in Self::target_distribution(&cleaned)? {
            info!("Target {}: {} ({:.1}%)", label, count, pct);
        }
        Ok(cleaned)
    }

    /// Same derivation, but rows are only dropped on missing features so the newest day,
    /// which has no next-day label yet, survives for scoring.
    pub fn compute_inference_features(&mut self, df: &DataFrame, date_column: &str) -> Result<DataFrame, FeatureError> {
        let derived = self.derive(df, date_column)?;
        let required = self.feature_columns.clone();
        clean(derived, &required)
    }

    fn derive(&mut self, df: &DataFrame, date_column: &str) -> Result<DataFrame, FeatureError> {
        let df = Self::create_technical_features(df)?;
        let df = Self::create_temporal_features(&df, date_column)?;
        let df = Self::create_target(&df)?;
        self.feature_columns = Self::get_feature_columns();
        Ok(df)
    }

    /// Trend, momentum, volatility, volume and same-day return columns.
    pub fn create_technical_features(df: &DataFrame) -> Result<DataFrame, FeatureError> {
        for name in REQUIRED_PRICE_COLUMNS {
            if df.column(name).is_err() {
                return Err(FeatureError::MissingColumn(name.to_string()));
            }
        }

        let high = column_with_nans(df, HIGH)?;
        let low = column_with_nans(df, LOW)?;
        let close = column_with_nans(df, CLOSE)?;

        let mut df = df.clone();
        for name in REQUIRED_PRICE_COLUMNS {
            let as_float = column_with_nans(&df, name)?;
            df.with_column(Series::new(name, as_float))?;
        }

        let volume: Vec<Option<f64>> = if df.column(VOLUME).is_ok() {
            column_with_nans(&df, VOLUME)?
                .into_iter()
                .map(|v| v.is_finite().then_some(v))
                .collect()
        } else {
            warn!("Column 'volume' not found. Synthesizing volume from the daily range...");
            indicators::synthetic_volume(&high, &low, &close)
                .into_iter()
                .map(Some)
                .collect()
        };

        df.with_column(Series::new(VOLUME, volume.clone()))?;
        df.with_column(Series::new("return_t", indicators::simple_returns(&close)))?;
        df.with_column(Series::new("RSI", indicators::rsi(&close, RSI_PERIOD)))?;
        df.with_column(Series::new(
            "ATR",
            indicators::atr(&high, &low, &close, ATR_PERIOD),
        ))?;
        df.with_column(Series::new(
            "volume_trend",
            indicators::rolling_slope(&volume, VOLUME_TREND_WINDOW),
        ))?;

        let df = df
            .lazy()
            .with_columns([
                col(CLOSE).rolling_mean(trailing(SMA_SHORT)).alias("SMA_30"),
                col(CLOSE).rolling_mean(trailing(SMA_LONG)).alias("SMA_90"),
                col("return_t")
                    .rolling_std(trailing(VOLATILITY_LONG))
                    .alias("volatility_30d"),
                col("return_t")
                    .rolling_std(trailing(VOLATILITY_SHORT))
                    .alias("volatility_rolling"),
                (col(VOLUME) / col(VOLUME).rolling_mean(trailing(VOLUME_MEAN_WINDOW)))
                    .alias("volume_ratio"),
            ])
            .with_columns([
                (col("SMA_30") - col("SMA_90")).alias("SMA_crossover"),
                (col("SMA_30") / col("SMA_90")).alias("sma_ratio"),
            ])
            .collect()?;

        Ok(df)
    }

    /// Calendar columns and their cyclical encodings. The date column is renamed to `date`.
    pub fn create_temporal_features(df: &DataFrame, date_column: &str) -> Result<DataFrame, FeatureError> {
        let source = df
            .column(date_column)
            .map_err(|_| FeatureError::MissingColumn(date_column.to_string()))?;

        let dates = match source.dtype() {
            DataType::Date => source.clone(),
            DataType::Datetime(_, _) => source.cast(&DataType::Date)?,
            other => {
                return Err(FeatureError::InvalidColumnType {
                    column: date_column.to_string(),
                    dtype: other.to_string(),
                });
            }
        };

        let mut df = df.clone();
        if date_column != DATE {
            let _ = df.drop_in_place(date_column)?;
            if df.column(DATE).is_ok() {
                let _ = df.drop_in_place(DATE)?;
            }
        }
        df.with_column(dates.with_name(DATE))?;

        let dates = date_column_checked(&df)?;
        let calendar: Vec<CalendarFeatures> = dates.iter().map(|d| CalendarFeatures::from_date(*d)).collect();

        df.with_column(Series::new("month", calendar.iter().map(|c| c.month).collect::<Vec<i32>>()))?;
        df.with_column(Series::new("quarter", calendar.iter().map(|c| c.quarter).collect::<Vec<i32>>()))?;
        df.with_column(Series::new(
            "day_of_week",
            calendar.iter().map(|c| c.day_of_week).collect::<Vec<i32>>(),
        ))?;
        df.with_column(Series::new(
            "is_month_end",
            calendar.iter().map(|c| c.is_month_end).collect::<Vec<i32>>(),
        ))?;
        df.with_column(Series::new("month_sin", calendar.iter().map(|c| c.month_sin).collect::<Vec<f64>>()))?;
        df.with_column(Series::new("month_cos", calendar.iter().map(|c| c.month_cos).collect::<Vec<f64>>()))?;
        df.with_column(Series::new("day_sin", calendar.iter().map(|c| c.day_sin).collect::<Vec<f64>>()))?;
        df.with_column(Series::new("day_cos", calendar.iter().map(|c| c.day_cos).collect::<Vec<f64>>()))?;

        Ok(df)
    }

    /// `return_t1`, the textual `target` and `target_encoded` (down=0, neutral=1, up=2).
    pub fn create_target(df: &DataFrame) -> Result<DataFrame, FeatureError> {
        let close = column_with_nans(df, CLOSE)?;
        let next_returns = indicators::forward_returns(&close);
        let directions: Vec<Option<Direction>> = next_returns
            .iter()
            .map(|r| r.map(Direction::from_return))
            .collect();

        let mut df = df.clone();
        df.with_column(Series::new(RETURN_T1, next_returns))?;
        df.with_column(Series::new(
            TARGET,
            directions.iter().map(|d| d.map(Direction::as_str)).collect::<Vec<Option<&str>>>(),
        ))?;
        df.with_column(Series::new(
            TARGET_ENCODED,
            directions
                .iter()
                .map(|d| d.map(|d| d.index() as i32))
                .collect::<Vec<Option<i32>>>(),
        ))?;
        Ok(df)
    }

    /// `(label, count, percent)` per class, in down/neutral/up order.
    pub fn target_distribution(df: &DataFrame) -> Result<Vec<(String, usize, f64)>, FeatureError> {
        let encoded = df.column(TARGET_ENCODED)?.cast(&DataType::Int32)?;
        let mut counts = [0usize; Direction::ALL.len()];
        for value in encoded.i32()?.into_iter().flatten() {
            if let Some(direction) = Direction::from_index(value as usize) {
                counts[direction.index()] += 1;
            }
        }
        let total = counts.iter().sum::<usize>().max(1) as f64;
        Ok(Direction::ALL
            .iter()
            .map(|d| {
                let count = counts[d.index()];
                (d.as_str().to_string(), count, count as f64 / total * 100.0)
            })
            .collect())
    }
}

fn date_column_checked(df: &DataFrame) -> Result<Vec<NaiveDate>, FeatureError> {
    let dates = date_column(df)?;
    if let Some(index) = dates.windows(2).position(|w| w[1] <= w[0]) {
        return Err(FeatureError::UnorderedDates { index: index + 1 });
    }
    Ok(dates)
}

/// Non-finite floats become missing, then rows missing any `required` column are dropped.
fn clean(mut df: DataFrame, required: &[String]) -> Result<DataFrame, FeatureError> {
    for name in required {
        let series = df
            .column(name)
            .map_err(|_| FeatureError::MissingColumn(name.clone()))?;
        if series.dtype() != &DataType::Float64 {
            continue;
        }
        let values: Vec<Option<f64>> = series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        df.with_column(Series::new(name.as_str(), values))?;
    }

    let initial = df.height();
    let subset: Vec<Expr> = required.iter().map(|name| col(name.as_str())).collect();
    let df = df.lazy().drop_nulls(Some(subset)).collect()?;
    let dropped = initial - df.height();

    info!("Rows dropped for missing values: {}", dropped);
    info!("Final rows: {}", df.height());

    if df.height() == 0 {
        return Err(FeatureError::EmptyFeatureSet { dropped });
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<String> {
        vec!["RSI".to_string(), "month".to_string()]
    }

    #[test]
    fn clean_drops_rows_with_infinite_or_nan_features() {
        let df = df! {
            "RSI" => [50.0, f64::INFINITY, f64::NAN, f64::NEG_INFINITY, 42.0],
            "month" => [1i32, 1, 1, 1, 2],
        }
        .unwrap();
        let cleaned = clean(df, &required()).unwrap();
        assert_eq!(cleaned.height(), 2);
        let rsi: Vec<Option<f64>> = cleaned.column("RSI").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(rsi, vec![Some(50.0), Some(42.0)]);
    }

    #[test]
    fn clean_ignores_non_finite_values_outside_the_required_columns() {
        let df = df! {
            "RSI" => [50.0, 51.0],
            "month" => [1i32, 2],
            "volume_ratio" => [f64::INFINITY, 1.0],
        }
        .unwrap();
        assert_eq!(clean(df, &required()).unwrap().height(), 2);
    }

    #[test]
    fn clean_fails_when_every_row_is_non_finite() {
        let df = df! {
            "RSI" => [f64::INFINITY, f64::NAN, f64::NEG_INFINITY],
            "month" => [1i32, 1, 1],
        }
        .unwrap();
        assert!(matches!(
            clean(df, &required()),
            Err(FeatureError::EmptyFeatureSet { dropped: 3 })
        ));
    }

    #[test]
    fn clean_reports_a_missing_required_column() {
        let df = df! { "RSI" => [50.0] }.unwrap();
        assert!(matches!(clean(df, &required()), Err(FeatureError::MissingColumn(name)) if name == "month"));
    }
}
