//! Shared image preprocessing
//!
//! Every image that reaches the network, in training batches and in served
//! predictions alike, goes through [`prepare_image`] and
//! [`to_chw_tensor_data`]. Pixels are resized with nearest-neighbour
//! sampling and mapped to `[-1, 1]` with `x / 127.5 - 1`.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};

use crate::utils::error::{CottonError, Result};

/// Interpolation used for every resize in the pipeline
pub const RESIZE_FILTER: FilterType = FilterType::Nearest;

/// Map one 8-bit channel value into `[-1, 1]`
#[inline]
pub fn normalize_pixel(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

/// Convert to RGB8 and resize to `size x size` without keeping aspect ratio
pub fn prepare_image(image: &DynamicImage, size: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    if rgb.width() == size && rgb.height() == size {
        return rgb;
    }
    image::imageops::resize(&rgb, size, size, RESIZE_FILTER)
}

/// Decode an uploaded or in-memory image (format guessed from content)
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| CottonError::ImageDecode(e.to_string()))
}

/// Open and decode an image file
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| CottonError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| CottonError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| CottonError::ImageLoad(path.to_path_buf(), e.to_string()))
}

/// Normalized CHW float data for an RGB image
pub fn to_chw_tensor_data(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let plane = width * height;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * width + x as usize;
        data[idx] = normalize_pixel(pixel[0]);
        data[plane + idx] = normalize_pixel(pixel[1]);
        data[2 * plane + idx] = normalize_pixel(pixel[2]);
    }

    data
}

/// Normalized CHW data from raw HWC RGB bytes, as stored in dataset items
pub fn hwc_bytes_to_chw(pixels: &[u8], size: usize) -> Vec<f32> {
    let plane = size * size;
    let mut data = vec![0.0f32; 3 * plane];

    for (idx, rgb) in pixels.chunks_exact(3).take(plane).enumerate() {
        data[idx] = normalize_pixel(rgb[0]);
        data[plane + idx] = normalize_pixel(rgb[1]);
        data[2 * plane + idx] = normalize_pixel(rgb[2]);
    }

    data
}

/// Decode, resize, and normalize in one step
pub fn preprocess_bytes(bytes: &[u8], size: u32) -> Result<Vec<f32>> {
    let image = decode_image(bytes)?;
    Ok(to_chw_tensor_data(&prepare_image(&image, size)))
}
