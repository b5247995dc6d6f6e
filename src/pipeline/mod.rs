pub mod classifier;
pub mod executor;
pub mod settings;

pub use classifier::{FeatureVector, FrameClassifier, GridLayout, RegionGridClassifier};
pub use executor::{ExecutorState, FeatureExtractionExecutor, FeatureFuture};
pub use settings::{Category, ColorRange, ColorRangeSettings};
