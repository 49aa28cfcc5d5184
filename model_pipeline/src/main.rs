use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use data_ingestion::logger::init_logger;
use data_ingestion::{AlphaVantageClient, AppConfig, PriceRow, RawDataStore};
use feature_processing::store::read_feature_csv;
use feature_processing::{FeatureStore, price_frame};
use log::info;
use model_pipeline::{PipelineRunner, Predictor, SoftmaxRegression};
use std::path::PathBuf;

/// Train, evaluate and apply the daily FX direction classifier.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, default_value = "pipeline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split, scale, train, save and evaluate on a feature table
    Train {
        /// Feature CSV to use instead of the latest stored version
        #[arg(long)]
        features: Option<PathBuf>,

        /// Versioned feature table name in the feature store
        #[arg(long, default_value = "forex_features")]
        name: String,
    },
    /// Predict the next-day direction with the latest model
    Predict {
        /// Day to score (YYYY-MM-DD); defaults to the newest day available
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Score the latest stored raw series instead of fetching a fresh one
        #[arg(long)]
        from_latest_raw: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let cfg = AppConfig::from_file(&cli.config)?;

    match cli.command {
        Command::Train { features, name } => {
            let df = match features {
                Some(path) => read_feature_csv(&path)?,
                None => FeatureStore::new(&cfg.storage.features_dir).load_latest_features(&name)?,
            };
            info!("Loaded feature table with shape {:?}", df.shape());

            let mut runner = PipelineRunner::new(df, &cfg);
            let outcome = runner.run()?;
            println!("{}", serde_json::to_string_pretty(&outcome.metrics)?);
        }
        Command::Predict {
            date,
            from_latest_raw,
        } => {
            let rows: Vec<PriceRow> = if from_latest_raw {
                let raw_name = format!(
                    "{}_{}_daily",
                    cfg.data_source.from_symbol.to_lowercase(),
                    cfg.data_source.to_symbol.to_lowercase()
                );
                RawDataStore::new(&cfg.storage.raw_dir).load_latest(&raw_name)?
            } else {
                let client = AlphaVantageClient::new(cfg.data_source.clone())?;
                client.fetch_configured().await?
            };
            let prices = price_frame(&rows)?;

            let mut predictor = Predictor::load_latest(
                &cfg.storage.model_dir,
                &cfg.training.pair,
                SoftmaxRegression::default(),
            )?;
            let prediction = predictor.predict(&prices, "date", date)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
    }

    Ok(())
}
