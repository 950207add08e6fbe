//! Training-time augmentation
//!
//! Random flip, rotation, contrast, and zoom applied to the resized 8-bit
//! image before normalization. Validation batches and served predictions
//! never pass through here.
//!
//! Rotation and zoom are fused into one inverse affine map sampled
//! bilinearly, with reflected borders.

use std::f32::consts::PI;

use image::{Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Ranges of the random transformations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Probability of a horizontal flip
    pub horizontal_flip_prob: f32,
    /// Rotation drawn from `±rotation_factor` of a full turn
    pub rotation_factor: f32,
    /// Contrast factor drawn from `1 ± contrast_factor`
    pub contrast_factor: f32,
    /// Vertical zoom drawn from `±zoom_height_factor`; positive zooms out
    pub zoom_height_factor: f32,
    pub zoom_width_factor: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            horizontal_flip_prob: 0.5,
            rotation_factor: 0.2,
            contrast_factor: 0.2,
            zoom_height_factor: 0.5,
            zoom_width_factor: 0.2,
        }
    }
}

impl AugmentationConfig {
    /// Milder ranges for small datasets where the default zoom crops too much
    pub fn light() -> Self {
        Self {
            horizontal_flip_prob: 0.5,
            rotation_factor: 0.05,
            contrast_factor: 0.1,
            zoom_height_factor: 0.1,
            zoom_width_factor: 0.1,
        }
    }

    pub fn none() -> Self {
        Self {
            horizontal_flip_prob: 0.0,
            rotation_factor: 0.0,
            contrast_factor: 0.0,
            zoom_height_factor: 0.0,
            zoom_width_factor: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.horizontal_flip_prob > 0.0
            || self.rotation_factor > 0.0
            || self.contrast_factor > 0.0
            || self.zoom_height_factor > 0.0
            || self.zoom_width_factor > 0.0
    }

    /// Look up a preset by name (`default`, `light`, `none`)
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" | "standard" => Some(Self::default()),
            "light" => Some(Self::light()),
            "none" | "off" => Some(Self::none()),
            _ => None,
        }
    }
}

/// Parameters drawn for one image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentParams {
    pub flip: bool,
    /// Radians, counter-clockwise
    pub angle: f32,
    pub contrast: f32,
    pub zoom_height: f32,
    pub zoom_width: f32,
}

impl AugmentParams {
    pub fn identity() -> Self {
        Self {
            flip: false,
            angle: 0.0,
            contrast: 1.0,
            zoom_height: 0.0,
            zoom_width: 0.0,
        }
    }
}

/// Applies random transformations drawn from an [`AugmentationConfig`]
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn sample_params(&self, rng: &mut ChaCha8Rng) -> AugmentParams {
        let c = &self.config;
        AugmentParams {
            flip: c.horizontal_flip_prob > 0.0 && rng.gen::<f32>() < c.horizontal_flip_prob,
            angle: symmetric(rng, c.rotation_factor) * 2.0 * PI,
            contrast: 1.0 + symmetric(rng, c.contrast_factor),
            zoom_height: symmetric(rng, c.zoom_height_factor),
            zoom_width: symmetric(rng, c.zoom_width_factor),
        }
    }

    /// Augment one image with freshly drawn parameters
    pub fn augment(&self, img: RgbImage, rng: &mut ChaCha8Rng) -> RgbImage {
        if !self.config.is_enabled() {
            return img;
        }
        let params = self.sample_params(rng);
        apply(img, &params)
    }
}

fn symmetric(rng: &mut ChaCha8Rng, factor: f32) -> f32 {
    if factor > 0.0 {
        rng.gen_range(-factor..=factor)
    } else {
        0.0
    }
}

/// Apply a fixed parameter set: flip, then rotation and zoom, then contrast
pub fn apply(img: RgbImage, params: &AugmentParams) -> RgbImage {
    let mut out = if params.flip {
        image::imageops::flip_horizontal(&img)
    } else {
        img
    };

    if params.angle.abs() > 1e-4 || params.zoom_height.abs() > 1e-4 || params.zoom_width.abs() > 1e-4 {
        out = affine(&out, params.angle, 1.0 + params.zoom_width, 1.0 + params.zoom_height);
    }

    if (params.contrast - 1.0).abs() > 1e-4 {
        out = adjust_contrast(&out, params.contrast);
    }

    out
}

/// Inverse-map each output pixel: scale around the centre, then rotate
fn affine(img: &RgbImage, angle: f32, scale_x: f32, scale_y: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let (sin_a, cos_a) = angle.sin_cos();

    RgbImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 - cx) * scale_x;
        let dy = (y as f32 - cy) * scale_y;
        let src_x = cx + dx * cos_a - dy * sin_a;
        let src_y = cy + dx * sin_a + dy * cos_a;
        bilinear_sample(img, src_x, src_y)
    })
}

/// Reflect a coordinate into `[0, len - 1]`, repeating the edge pixel
fn reflect(coord: f32, len: u32) -> f32 {
    let len = len as f32;
    if len <= 1.0 {
        return 0.0;
    }
    let period = 2.0 * len;
    let mut c = (coord + 0.5).rem_euclid(period);
    if c >= len {
        c = period - c;
    }
    (c - 0.5).clamp(0.0, len - 1.0)
}

fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let x = reflect(x, width);
    let y = reflect(y, height);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(result)
}

/// Scale each channel around its own mean, clamped to the 8-bit range
fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let count = (img.width() * img.height()).max(1) as f64;
    let mut sums = [0.0f64; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            sums[c] += pixel[c] as f64;
        }
    }
    let means = sums.map(|s| (s / count) as f32);

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for c in 0..3 {
            let v = means[c] + factor * (pixel[c] as f32 - means[c]);
            pixel[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gradient(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]))
    }

    #[test]
    fn test_none_is_identity() {
        let img = gradient(16);
        let augmenter = Augmenter::new(AugmentationConfig::none());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(augmenter.augment(img.clone(), &mut rng), img);
    }

    #[test]
    fn test_params_within_ranges() {
        let augmenter = Augmenter::new(AugmentationConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let p = augmenter.sample_params(&mut rng);
            assert!(p.angle.abs() <= 0.2 * 2.0 * PI + 1e-5);
            assert!((0.8..=1.2).contains(&p.contrast));
            assert!(p.zoom_height.abs() <= 0.5);
            assert!(p.zoom_width.abs() <= 0.2);
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let augmenter = Augmenter::new(AugmentationConfig::default());
        let a = augmenter.augment(gradient(20), &mut ChaCha8Rng::seed_from_u64(9));
        let b = augmenter.augment(gradient(20), &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_flip_only() {
        let img = gradient(8);
        let params = AugmentParams {
            flip: true,
            ..AugmentParams::identity()
        };
        let out = apply(img.clone(), &params);
        assert_eq!(out.get_pixel(0, 3), img.get_pixel(7, 3));
    }

    #[test]
    fn test_half_turn_rotation() {
        let img = gradient(9);
        let params = AugmentParams {
            angle: PI,
            ..AugmentParams::identity()
        };
        let out = apply(img.clone(), &params);
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(8, 8));
        assert_eq!(out.get_pixel(4, 4), img.get_pixel(4, 4));
    }

    #[test]
    fn test_contrast_keeps_uniform_image() {
        let img = RgbImage::from_pixel(6, 6, Rgb([90, 120, 200]));
        let out = adjust_contrast(&img, 1.2);
        assert_eq!(out, img);
    }

    #[test]
    fn test_contrast_stretches_around_mean() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([100, 100, 100]));
        img.put_pixel(1, 0, Rgb([200, 200, 200]));
        let out = adjust_contrast(&img, 2.0);
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 50, 50]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([250, 250, 250]));
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(3.0, 10), 3.0);
        assert_eq!(reflect(-1.0, 10), 0.0);
        assert_eq!(reflect(10.0, 10), 9.0);
        assert!((reflect(-2.0, 10) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_presets() {
        assert_eq!(AugmentationConfig::preset("none"), Some(AugmentationConfig::none()));
        assert!(AugmentationConfig::preset("LIGHT").is_some());
        assert!(AugmentationConfig::preset("extreme").is_none());
        assert!(!AugmentationConfig::none().is_enabled());
    }
}
