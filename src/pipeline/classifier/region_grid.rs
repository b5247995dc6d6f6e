use image::imageops::{self, FilterType};
use image::RgbImage;
use imageproc::morphology::Mask;
use std::sync::Arc;
use tracing::debug;

use super::feature::FeatureVector;
use super::grid::GridLayout;
use super::mask::{count_foreground, in_range, intersect};
use super::morphology;
use crate::common::{CropRect, Frame};
use crate::error::{AppError, Result};
use crate::pipeline::settings::{Category, ColorRangeSettings};

/// Strategy for turning a frame into a feature vector.
pub trait FrameClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<FeatureVector>;
    fn name(&self) -> &'static str;
}

/// Lane occupancy classifier.
///
/// Crops the play area out of a frame, scales it to the layout's canvas with
/// linear interpolation, opens it with a 5x5 square to suppress noise, then
/// counts per grid cell the pixels that are both coin- and path-colored
/// ("pathway") and the pixels that are player-colored. Pixels are compared in
/// RGB order after dropping any alpha channel.
#[derive(Debug, Clone)]
pub struct RegionGridClassifier {
    crop: CropRect,
    settings: Arc<ColorRangeSettings>,
    layout: GridLayout,
}

impl RegionGridClassifier {
    /// Half-width of the square structuring element (5x5).
    pub const KERNEL_RADIUS: u8 = 2;

    pub fn new(crop: CropRect, settings: Arc<ColorRangeSettings>) -> Self {
        Self::with_layout(crop, settings, GridLayout::CANONICAL)
    }

    pub fn with_layout(crop: CropRect, settings: Arc<ColorRangeSettings>, layout: GridLayout) -> Self {
        Self {
            crop,
            settings,
            layout,
        }
    }

    /// Cropped, resized and opened RGB canvas the masks are computed on.
    pub fn prepare(&self, frame: &Frame) -> Result<RgbImage> {
        let (width, height) = (frame.width(), frame.height());
        if !self.crop.fits_within(width, height) {
            return Err(AppError::OutOfBounds {
                crop: self.crop,
                width,
                height,
            });
        }

        let CropRect {
            x,
            y,
            width: crop_w,
            height: crop_h,
        } = self.crop;
        let roi = frame.image().crop_imm(x, y, crop_w, crop_h).to_rgb8();

        let (canvas_w, canvas_h) = self.layout.canvas_size();
        let resized = imageops::resize(&roi, canvas_w, canvas_h, FilterType::Triangle);

        Ok(morphology::open(&resized, &Mask::square(Self::KERNEL_RADIUS)))
    }

    fn count_cells(&self, mask: &image::GrayImage, out: &mut Vec<u32>) {
        let (cell_w, cell_h) = self.layout.cell_size();
        out.extend(
            self.layout
                .cells()
                .map(|cell| count_foreground(mask, cell.x, cell.y, cell_w, cell_h)),
        );
    }
}

impl FrameClassifier for RegionGridClassifier {
    fn classify(&self, frame: &Frame) -> Result<FeatureVector> {
        let canvas = self.prepare(frame)?;

        let coin = in_range(&canvas, self.settings.range(Category::Coin));
        let path = in_range(&canvas, self.settings.range(Category::Path));
        let pathway = intersect(&coin, &path);
        let player = in_range(&canvas, self.settings.range(Category::Player));

        let mut features = Vec::with_capacity(self.layout.feature_len());
        self.count_cells(&pathway, &mut features);
        self.count_cells(&player, &mut features);

        debug!(
            "Classified frame {} into {} features",
            frame.id(),
            features.len()
        );
        Ok(FeatureVector::new(features))
    }

    fn name(&self) -> &'static str {
        "RegionGridClassifier"
    }
}
