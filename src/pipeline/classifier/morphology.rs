//! Grey-level opening of RGB images, applied to each channel separately.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::morphology::{grayscale_open, Mask};

/// Erosion followed by dilation with `mask`, channel by channel. Removes
/// bright specks smaller than the mask while keeping larger regions intact.
/// Mask positions outside the image are ignored.
pub fn open(image: &RgbImage, mask: &Mask) -> RgbImage {
    let [r, g, b] = [0, 1, 2].map(|c| grayscale_open(&channel(image, c), mask));
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb([r.get_pixel(x, y)[0], g.get_pixel(x, y)[0], b.get_pixel(x, y)[0]])
    })
}

fn channel(image: &RgbImage, index: usize) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[index]])
    })
}
