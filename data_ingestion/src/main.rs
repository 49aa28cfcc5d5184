use anyhow::Result;
use clap::Parser;
use data_ingestion::logger::init_logger;
use data_ingestion::{AlphaVantageClient, AppConfig, RawDataStore};
use log::info;
use std::path::PathBuf;

/// Fetch the configured daily FX series and store it as a versioned raw CSV.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = "pipeline.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let cfg = AppConfig::from_file(&cli.config)?;

    let client = AlphaVantageClient::new(cfg.data_source.clone())?;
    let rows = client.fetch_configured().await?;

    let store = RawDataStore::new(&cfg.storage.raw_dir);
    let name = format!(
        "{}_{}_daily",
        cfg.data_source.from_symbol.to_lowercase(),
        cfg.data_source.to_symbol.to_lowercase()
    );
    let path = store.store(&rows, &name)?;

    info!("Raw series for {} stored in {}", cfg.data_source.pair(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_overrides_the_default_path() {
        let cli = Cli::try_parse_from(["data_ingestion", "--config", "configs/eurgbp.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("configs/eurgbp.toml"));
    }

    #[test]
    fn config_defaults_to_pipeline_toml() {
        let cli = Cli::try_parse_from(["data_ingestion"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("pipeline.toml"));
    }
}
