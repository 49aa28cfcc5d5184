use anyhow::Result;
use clap::Parser;
use data_ingestion::logger::init_logger;
use data_ingestion::{AlphaVantageClient, AppConfig, PriceRow, RawDataStore};
use feature_processing::{FeatureEngineer, FeatureStore, price_frame};
use log::info;
use std::path::PathBuf;

/// Fetch a daily FX series, store it raw, derive features and store the feature table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = "pipeline.toml")]
    config: PathBuf,

    /// Reuse the latest stored raw series instead of calling the data source
    #[arg(long)]
    from_latest_raw: bool,

    /// Name under which the feature table is versioned
    #[arg(long, default_value = "forex_features")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let cfg = AppConfig::from_file(&cli.config)?;

    let raw_store = RawDataStore::new(&cfg.storage.raw_dir);
    let raw_name = format!(
        "{}_{}_daily",
        cfg.data_source.from_symbol.to_lowercase(),
        cfg.data_source.to_symbol.to_lowercase()
    );

    let rows: Vec<PriceRow> = if cli.from_latest_raw {
        raw_store.load_latest(&raw_name)?
    } else {
        let client = AlphaVantageClient::new(cfg.data_source.clone())?;
        let rows = client.fetch_configured().await?;
        raw_store.store(&rows, &raw_name)?;
        rows
    };

    let raw = price_frame(&rows)?;
    let mut engineer = FeatureEngineer::new();
    let features = engineer.compute_features(&raw, "date")?;
    info!("Feature table shape: {:?}", features.shape());

    let store = FeatureStore::new(&cfg.storage.features_dir);
    let path = store.save_features(&features, &cli.name, true)?;
    info!("Saved to: {}", path.display());

    Ok(())
}
