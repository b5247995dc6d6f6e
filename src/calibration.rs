use image::DynamicImage;
use imageproc::contours::{find_contours, Contour};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::geometry::contour_area;
use tracing::{debug, info};

use crate::common::CropRect;
use crate::error::{AppError, Result};

/// Luma level above which a pixel counts as part of the lit play area.
pub const BINARY_THRESHOLD: u8 = 25;

/// Finds the game's play area in a screenshot: the bounding box of the
/// largest bright contour.
pub fn locate_play_area(image: &DynamicImage) -> Result<CropRect> {
    let binary = threshold(&image.to_luma8(), BINARY_THRESHOLD, ThresholdType::Binary);
    let contours = find_contours::<i32>(&binary);
    debug!("Calibration found {} contours", contours.len());

    let rect = contours
        .iter()
        .filter_map(|contour| bounding_rect(contour).map(|rect| (contour_area(&contour.points), rect)))
        .max_by(|(area_a, rect_a), (area_b, rect_b)| {
            area_a
                .total_cmp(area_b)
                .then(rect_a.area().cmp(&rect_b.area()))
        })
        .map(|(_, rect)| rect)
        .ok_or_else(|| {
            AppError::Calibration(format!(
                "no region brighter than {BINARY_THRESHOLD} in a {}x{} screenshot",
                image.width(),
                image.height()
            ))
        })?;

    info!("Play area located at {}", rect);
    Ok(rect)
}

fn bounding_rect(contour: &Contour<i32>) -> Option<CropRect> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(CropRect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
