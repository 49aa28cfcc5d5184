pub mod config;
pub mod error;
pub mod fetcher;
pub mod logger;
pub mod storage;

pub use config::AppConfig;
pub use error::DataIngestionError;
pub use fetcher::{AlphaVantageClient, PriceRow};
pub use storage::RawDataStore;
