//! Image → NCHW tensor conversion for the visual encoder.
//!
//! Input images are already cropped and masked upstream; here they are only
//! resized to the square model input, converted to RGB and normalized per channel
//! via `(pixel/255 - mean) / std`.

use image::DynamicImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Channel normalization applied after scaling pixels to [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub mean: f32,
    pub std: f32,
}

/// Resize, convert and normalize an image into a `[1, 3, size, size]` tensor.
pub fn preprocess(
    image: &DynamicImage,
    image_size: u32,
    norm: Normalization,
) -> Result<Array4<f32>, ndarray::ShapeError> {
    let resized = image.resize_exact(
        image_size,
        image_size,
        image::imageops::FilterType::Lanczos3,
    );
    let rgb = resized.to_rgb8();

    let size = image_size as usize;
    let plane = size * size;
    let mut data = vec![0.0f32; CHANNELS * plane];

    // NCHW: offset = c * plane + y * size + x, and raw pixel i maps to (y, x) = (i / size, i % size).
    for (i, pixel) in rgb.as_raw().chunks_exact(CHANNELS).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            data[c * plane + i] = (val as f32 / 255.0 - norm.mean) / norm.std;
        }
    }

    Array4::from_shape_vec((1, CHANNELS, size, size), data)
}
