use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Alpha Vantage connection and the pair to request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_symbol: String,
    pub to_symbol: String,
    pub output_size: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.alphavantage.co/query".to_string(),
            api_key: String::new(),
            from_symbol: "EUR".to_string(),
            to_symbol: "GBP".to_string(),
            output_size: "full".to_string(),
        }
    }
}

impl DataSourceConfig {
    /// Lower-case pair id used in artifact and dataset names, e.g. `eurgbp`.
    pub fn pair(&self) -> String {
        format!("{}{}", self.from_symbol, self.to_symbol).to_lowercase()
    }

    // API_URL / API_KEY from a plain `.env` still work when the prefixed keys are absent.
    fn apply_env_fallbacks(&mut self) {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var("API_KEY") {
                self.api_key = key;
            }
        }
        if let Ok(url) = std::env::var("API_URL") {
            if !url.is_empty() && self.api_url == DataSourceConfig::default().api_url {
                self.api_url = url;
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub raw_dir: PathBuf,
    pub features_dir: PathBuf,
    pub model_dir: PathBuf,
    pub test_runs_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            features_dir: PathBuf::from("data/preprocessed"),
            model_dir: PathBuf::from("artifacts/model"),
            test_runs_dir: PathBuf::from("artifacts/test_runs"),
        }
    }
}

/// Knobs for the split, the default classifier and the evaluation report.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub pair: String,
    /// Rows of this calendar year form the test partition, earlier years the train partition.
    pub test_year: i32,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub l2_penalty: f64,
    pub tolerance: f64,
    pub label_names: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            pair: "eurgbp".to_string(),
            test_year: 2024,
            max_iter: 1000,
            learning_rate: 0.1,
            l2_penalty: 1.0,
            tolerance: 1e-6,
            label_names: vec!["Down".to_string(), "Uncertain".to_string(), "Up".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_source: DataSourceConfig,
    pub storage: StorageConfig,
    pub training: TrainingConfig,
}

impl AppConfig {
    /// Layered load: `.env`, then the TOML file (optional), then `FX_<SECTION>__<KEY>` variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.as_ref().to_string_lossy().into_owned();
        let cfg = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("FX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = cfg.try_deserialize()?;
        app.data_source.apply_env_fallbacks();
        Ok(app)
    }
}
