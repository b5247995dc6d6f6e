use image::{GrayImage, ImageBuffer, Luma, RgbImage};

use crate::pipeline::settings::ColorRange;

const FOREGROUND: Luma<u8> = Luma([255]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Binary mask of the pixels whose every channel lies inside `range`.
pub fn in_range(image: &RgbImage, range: &ColorRange) -> GrayImage {
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        if range.contains(image.get_pixel(x, y)) {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

/// Pixel-wise AND of two masks of equal size.
pub fn intersect(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        if a.get_pixel(x, y)[0] != 0 && b.get_pixel(x, y)[0] != 0 {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

/// Foreground pixels in the `width` x `height` window at (`x`, `y`). The
/// window is clamped to the mask.
pub fn count_foreground(mask: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> u32 {
    let x_end = (x + width).min(mask.width());
    let y_end = (y + height).min(mask.height());
    let mut count = 0;
    for py in y..y_end {
        for px in x..x_end {
            if mask.get_pixel(px, py)[0] != 0 {
                count += 1;
            }
        }
    }
    count
}
