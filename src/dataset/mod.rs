//! Dataset handling: directory loading, shared preprocessing, training
//! augmentation, and Burn dataset/batcher glue.

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod preprocess;

use std::path::Path;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{AugmentingBatcher, LeafBatch, LeafBatcher, LeafImageDataset, LeafItem};
pub use loader::{CottonLeafDataset, DatasetStats, ImageSample};

use crate::utils::error::{CottonError, Result};

/// File extensions accepted as dataset images
pub const IMAGE_EXTENSIONS: [&str; 5] = ["bmp", "gif", "jpeg", "jpg", "png"];

/// Whether a path has one of [`IMAGE_EXTENSIONS`] (case-insensitive)
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Persist class names in label order as a JSON array
pub fn save_class_names(path: &Path, class_names: &[String]) -> Result<()> {
    let json = serde_json::to_string_pretty(class_names)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load the class names written by [`save_class_names`]
pub fn load_class_names(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(CottonError::PathNotFound(path.to_path_buf()));
    }
    let json = std::fs::read_to_string(path)?;
    let names: Vec<String> = serde_json::from_str(&json)?;
    if names.is_empty() {
        return Err(CottonError::Config(format!("{:?} lists no classes", path)));
    }
    Ok(names)
}
