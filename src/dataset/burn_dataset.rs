//! Burn dataset and batchers for cotton leaf images
//!
//! Items hold the resized 8-bit RGB image so the training batcher can
//! augment it before normalization. Both batchers normalize through
//! [`preprocess::hwc_bytes_to_chw`], the same code path the predictor uses.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::warn;

use super::augmentation::{AugmentationConfig, Augmenter};
use super::loader::ImageSample;
use super::preprocess;
use crate::utils::error::Result;

/// A resized image and its label
#[derive(Clone, Debug)]
pub struct LeafItem {
    /// HWC RGB bytes, `size * size * 3` long
    pub pixels: Vec<u8>,
    pub label: usize,
    pub path: PathBuf,
}

impl LeafItem {
    /// Load, convert to RGB, and resize with the shared preprocessing
    pub fn from_path(path: &PathBuf, label: usize, image_size: usize) -> Result<Self> {
        let image = preprocess::open_image(path)?;
        let rgb = preprocess::prepare_image(&image, image_size as u32);
        Ok(Self {
            pixels: rgb.into_raw(),
            label,
            path: path.clone(),
        })
    }

    fn to_rgb_image(&self, image_size: usize) -> Option<RgbImage> {
        RgbImage::from_raw(image_size as u32, image_size as u32, self.pixels.clone())
    }
}

/// Dataset over image samples, decoded lazily or preloaded in memory
#[derive(Debug, Clone)]
pub struct LeafImageDataset {
    samples: Vec<(PathBuf, usize)>,
    image_size: usize,
    cached_items: Option<Arc<Vec<LeafItem>>>,
}

impl LeafImageDataset {
    pub fn new(samples: &[ImageSample], image_size: usize) -> Self {
        Self {
            samples: samples.iter().map(|s| (s.path.clone(), s.label)).collect(),
            image_size,
            cached_items: None,
        }
    }

    /// Decode every image up front (in parallel). Unreadable files are
    /// skipped with a warning.
    pub fn new_cached(samples: &[ImageSample], image_size: usize) -> Self {
        let pb = ProgressBar::new(samples.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicU64::new(0);
        let items: Vec<LeafItem> = samples
            .par_iter()
            .filter_map(|sample| {
                let item = match LeafItem::from_path(&sample.path, sample.label, image_size) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!("Skipping {:?}: {}", sample.path, e);
                        None
                    }
                };
                let count = loaded.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 64 == 0 {
                    pb.set_position(count);
                }
                item
            })
            .collect();
        pb.finish_and_clear();

        Self {
            samples: items.iter().map(|item| (item.path.clone(), item.label)).collect(),
            image_size,
            cached_items: Some(Arc::new(items)),
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn is_cached(&self) -> bool {
        self.cached_items.is_some()
    }
}

impl Dataset<LeafItem> for LeafImageDataset {
    fn get(&self, index: usize) -> Option<LeafItem> {
        if let Some(cached) = &self.cached_items {
            return cached.get(index).cloned();
        }

        let (path, label) = self.samples.get(index)?;
        match LeafItem::from_path(path, *label, self.image_size) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of normalized images and their labels
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// `[batch_size, 3, height, width]` in `[-1, 1]`
    pub images: Tensor<B, 4>,
    /// `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

fn build_batch<B: Backend>(
    images_data: Vec<f32>,
    targets_data: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> LeafBatch<B> {
    let batch_size = targets_data.len();
    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(images_data, [batch_size, 3, image_size, image_size]),
        device,
    );
    let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);
    LeafBatch { images, targets }
}

/// Batcher without augmentation, for validation
#[derive(Clone, Debug)]
pub struct LeafBatcher {
    image_size: usize,
}

impl LeafBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let mut images_data = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        for item in &items {
            images_data.extend(preprocess::hwc_bytes_to_chw(&item.pixels, self.image_size));
            targets_data.push(item.label as i64);
        }

        build_batch(images_data, targets_data, self.image_size, device)
    }
}

/// Batcher that augments every item before normalization, for training.
///
/// Each call draws a fresh batch seed from a counter so runs are
/// reproducible for a given base seed.
#[derive(Debug)]
pub struct AugmentingBatcher {
    image_size: usize,
    augmenter: Augmenter,
    seed: u64,
    calls: AtomicU64,
}

impl Clone for AugmentingBatcher {
    fn clone(&self) -> Self {
        Self {
            image_size: self.image_size,
            augmenter: self.augmenter.clone(),
            seed: self.seed,
            calls: AtomicU64::new(self.calls.load(Ordering::Relaxed)),
        }
    }
}

impl AugmentingBatcher {
    pub fn new(image_size: usize, config: AugmentationConfig, seed: u64) -> Self {
        Self {
            image_size,
            augmenter: Augmenter::new(config),
            seed,
            calls: AtomicU64::new(0),
        }
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(call));

        let mut images_data = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        for item in &items {
            let data = match item.to_rgb_image(self.image_size) {
                Some(rgb) => preprocess::to_chw_tensor_data(&self.augmenter.augment(rgb, &mut rng)),
                None => preprocess::hwc_bytes_to_chw(&item.pixels, self.image_size),
            };
            images_data.extend(data);
            targets_data.push(item.label as i64);
        }

        build_batch(images_data, targets_data, self.image_size, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn item(value: u8, label: usize, size: usize) -> LeafItem {
        LeafItem {
            pixels: vec![value; size * size * 3],
            label,
            path: PathBuf::from(format!("{}.png", label)),
        }
    }

    #[test]
    fn test_plain_batch_shape_and_range() {
        let device = Default::default();
        let batcher = LeafBatcher::new(4);
        let batch: LeafBatch<TestBackend> = batcher.batch(vec![item(0, 1, 4), item(255, 3, 4)], &device);

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        assert!(values[..48].iter().all(|&v| v == -1.0));
        assert!(values[48..].iter().all(|&v| v == 1.0));

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![1, 3]);
    }

    #[test]
    fn test_augmenting_batch_without_augmentation_matches_plain() {
        let device = Default::default();
        let items = vec![item(10, 0, 6), item(200, 1, 6)];

        let plain: LeafBatch<TestBackend> = LeafBatcher::new(6).batch(items.clone(), &device);
        let augmenting: LeafBatch<TestBackend> =
            AugmentingBatcher::new(6, AugmentationConfig::none(), 1).batch(items, &device);

        assert_eq!(
            plain.images.into_data().to_vec::<f32>().unwrap(),
            augmenting.images.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_augmented_values_stay_normalized() {
        let device = Default::default();
        let mut it = item(0, 0, 8);
        for (i, p) in it.pixels.iter_mut().enumerate() {
            *p = (i % 256) as u8;
        }
        let batch: LeafBatch<TestBackend> =
            AugmentingBatcher::new(8, AugmentationConfig::default(), 5).batch(vec![it], &device);

        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_dataset_lazy_and_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        image::RgbImage::from_pixel(20, 10, image::Rgb([1, 2, 3])).save(&path).unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"nope").unwrap();

        let samples = vec![
            ImageSample { path: path.clone(), label: 2, class_name: "Aphids".into() },
            ImageSample { path: broken, label: 0, class_name: "Aphids".into() },
        ];

        let lazy = LeafImageDataset::new(&samples, 8);
        assert_eq!(lazy.len(), 2);
        let first = lazy.get(0).unwrap();
        assert_eq!(first.pixels.len(), 8 * 8 * 3);
        assert_eq!(&first.pixels[..3], &[1, 2, 3]);
        assert!(lazy.get(1).is_none());

        let cached = LeafImageDataset::new_cached(&samples, 8);
        assert!(cached.is_cached());
        assert_eq!(cached.len(), 1);
        assert_eq!(cached.get(0).unwrap().label, 2);
    }
}
