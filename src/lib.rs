pub mod calibration;
pub mod collector;
pub mod common;
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;

pub use common::{CropRect, Frame};
pub use error::{AppError, Result};
pub use pipeline::{
    ColorRangeSettings, ExecutorState, FeatureExtractionExecutor, FeatureFuture, FeatureVector,
    RegionGridClassifier,
};
