use chrono::NaiveDate;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DataSourceConfig;
use crate::error::DataIngestionError;

const DAILY_SERIES_KEY: &str = "Time Series FX (Daily)";

/// One calendar day of a currency pair.
///
/// `volume` is absent for FX feeds; the feature engine synthesizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

pub struct AlphaVantageClient {
    client: Client,
    config: DataSourceConfig,
}

impl AlphaVantageClient {
    pub fn new(config: DataSourceConfig) -> Result<Self, DataIngestionError> {
        if config.api_key.is_empty() {
            return Err(DataIngestionError::MissingSetting("data_source.api_key"));
        }
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    /// Fetch the configured pair.
    pub async fn fetch_configured(&self) -> Result<Vec<PriceRow>, DataIngestionError> {
        self.fetch_daily_series(
            &self.config.from_symbol,
            &self.config.to_symbol,
            &self.config.output_size,
        )
        .await
    }

    /// `FX_DAILY` series for `from_symbol/to_symbol`, ascending by date.
    pub async fn fetch_daily_series(
        &self,
        from_symbol: &str,
        to_symbol: &str,
        output_size: &str,
    ) -> Result<Vec<PriceRow>, DataIngestionError> {
        info!(
            "Requesting daily series from {} for {}/{}...",
            self.config.api_url, from_symbol, to_symbol
        );

        let params = [
            ("function", "FX_DAILY"),
            ("from_symbol", from_symbol),
            ("to_symbol", to_symbol),
            ("outputsize", output_size),
            ("apikey", self.config.api_key.as_str()),
            ("datatype", "json"),
        ];

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let json_resp: serde_json::Value = response.json().await?;
        let rows = parse_daily_series(&json_resp)?;

        info!("Fetched {} daily records.", rows.len());
        Ok(rows)
    }
}

/// Extract the daily OHLC map from an Alpha Vantage payload.
///
/// Field names arrive numbered (`"1. open"`); only the part after `". "` is used.
pub fn parse_daily_series(payload: &serde_json::Value) -> Result<Vec<PriceRow>, DataIngestionError> {
    let daily = payload
        .get(DAILY_SERIES_KEY)
        .and_then(|v| v.as_object())
        .ok_or_else(|| DataIngestionError::UpstreamSchemaError {
            key: DAILY_SERIES_KEY.to_string(),
        })?;

    let mut rows = Vec::with_capacity(daily.len());
    for (day, fields) in daily.iter() {
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
            DataIngestionError::MalformedValue {
                date: day.clone(),
                field: "date",
                value: day.clone(),
            }
        })?;

        let field = |name: &'static str| -> Result<Option<f64>, DataIngestionError> {
            let Some(obj) = fields.as_object() else {
                return Ok(None);
            };
            let raw = obj
                .iter()
                .find(|(k, _)| k.rsplit(". ").next() == Some(name))
                .map(|(_, v)| v);
            match raw {
                None => Ok(None),
                Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
                    DataIngestionError::MalformedValue {
                        date: day.clone(),
                        field: name,
                        value: s.clone(),
                    }
                }),
                Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
                Some(other) => Err(DataIngestionError::MalformedValue {
                    date: day.clone(),
                    field: name,
                    value: other.to_string(),
                }),
            }
        };

        let require = |name: &'static str| -> Result<f64, DataIngestionError> {
            field(name)?.ok_or_else(|| DataIngestionError::MalformedValue {
                date: day.clone(),
                field: name,
                value: "<missing>".to_string(),
            })
        };

        rows.push(PriceRow {
            date,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: field("volume")?,
        });
    }

    // Upstream lists newest first.
    rows.sort_by_key(|row| row.date);
    debug!("Parsed {} rows from upstream payload", rows.len());
    Ok(rows)
}
