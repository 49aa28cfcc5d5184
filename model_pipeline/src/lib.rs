pub mod classifier;
pub mod error;
pub mod evaluator;
pub mod misc;
pub mod pipeline;
pub mod predictor;
pub mod preprocessor;
pub mod registry;
pub mod report;
pub mod trainer;

pub use classifier::{Classifier, SoftmaxRegression};
pub use error::PipelineError;
pub use evaluator::{ConfusionMatrix, EvaluationResult, evaluate};
pub use pipeline::{PipelineOutcome, PipelineRunner, PipelineStage};
pub use predictor::Predictor;
pub use preprocessor::{Preprocessor, SplitData, StandardScaler};
pub use registry::{ArtifactRegistry, VersionId};
pub use trainer::{ModelArtifact, ModelTrainer, train_pairs};
