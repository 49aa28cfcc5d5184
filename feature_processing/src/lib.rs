pub mod error;
pub mod indicators;
pub mod misc;
pub mod processor;
pub mod store;

pub use error::FeatureError;
pub use misc::Direction;
pub use processor::{FeatureEngineer, price_frame};
pub use store::FeatureStore;
