use thiserror::Error;

use crate::common::CropRect;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Configuration(String),
    #[error("Crop rectangle {crop} exceeds frame bounds {width}x{height}")]
    OutOfBounds {
        crop: CropRect,
        width: u32,
        height: u32,
    },
    #[error("The extractor is busy with another frame.")]
    Busy,
    #[error("The extractor is stopped.")]
    Shutdown,
    #[error("The extractor is already started.")]
    AlreadyStarted,
    #[error("Extraction failed: {0}")]
    Extraction(String),
    #[error("Calibration Error: {0}")]
    Calibration(String),
    #[error("Dataset Error: {0}")]
    Dataset(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
