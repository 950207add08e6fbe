//! Labeled directory tree loader
//!
//! Each immediate sub-directory of the dataset root is one class. Class
//! indices follow the sorted directory names, which is also the order
//! persisted to `class_names.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::is_image_file;
use crate::utils::error::{CottonError, Result};

/// One image file with its class label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    pub path: PathBuf,
    pub label: usize,
    pub class_name: String,
}

/// Cotton leaf images discovered under a root directory
#[derive(Debug, Clone)]
pub struct CottonLeafDataset {
    pub root_dir: PathBuf,
    pub samples: Vec<ImageSample>,
    class_names: Vec<String>,
}

impl CottonLeafDataset {
    /// Scan a dataset root laid out as:
    /// ```text
    /// root_dir/
    /// ├── Aphids/
    /// │   ├── img_001.jpg
    /// │   └── ...
    /// ├── Healthy leaf/
    /// └── ...
    /// ```
    /// Images may sit in nested folders below a class directory.
    pub fn from_dir<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading cotton leaf dataset from {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(CottonError::PathNotFound(root_dir));
        }

        let mut class_names = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                match entry.file_name().into_string() {
                    Ok(name) => class_names.push(name),
                    Err(name) => warn!("Skipping non UTF-8 class directory {:?}", name),
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(CottonError::Dataset(format!(
                "no class directories found in {:?}",
                root_dir
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let class_dir = root_dir.join(class_name);
            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            paths.sort();

            debug!("Class '{}' (label {}): {} images", class_name, label, paths.len());

            samples.extend(paths.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));
        }

        if samples.is_empty() {
            return Err(CottonError::Dataset(format!(
                "no images found under {:?}",
                root_dir
            )));
        }

        info!(
            "Found {} images in {} classes: {:?}",
            samples.len(),
            class_names.len(),
            class_names
        );

        Ok(Self {
            root_dir,
            samples,
            class_names,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Class names in label order
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Shuffle the samples in place with a given seed
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
    }

    /// Stratified hold-out split.
    ///
    /// Takes `fraction` of every class (rounded down, but at least one image
    /// when the class has two or more) into the second set. A fraction of
    /// zero returns an empty hold-out.
    pub fn split_holdout(&self, fraction: f64, seed: u64) -> Result<(Vec<ImageSample>, Vec<ImageSample>)> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(CottonError::Config(format!(
                "validation fraction must be in [0, 1), got {}",
                fraction
            )));
        }

        if fraction == 0.0 {
            return Ok((self.samples.clone(), Vec::new()));
        }

        let mut by_class: BTreeMap<usize, Vec<ImageSample>> = BTreeMap::new();
        for sample in &self.samples {
            by_class.entry(sample.label).or_default().push(sample.clone());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut holdout = Vec::new();

        for (_, mut class_samples) in by_class {
            class_samples.shuffle(&mut rng);
            let mut n_holdout = (class_samples.len() as f64 * fraction).floor() as usize;
            if n_holdout == 0 && class_samples.len() >= 2 {
                n_holdout = 1;
            }
            let rest = class_samples.split_off(n_holdout);
            holdout.extend(class_samples);
            train.extend(rest);
        }

        train.shuffle(&mut rng);
        info!("Hold-out split: {} train / {} validation", train.len(), holdout.len());
        Ok((train, holdout))
    }

    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            class_names: self.class_names.clone(),
            class_counts,
        }
    }
}

/// Per-class image counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub class_names: Vec<String>,
    pub class_counts: Vec<usize>,
}

impl DatasetStats {
    pub fn print(&self) {
        println!("\nDataset:");
        println!("  Total images: {}", self.total_samples);
        println!("  Classes: {}", self.class_names.len());

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = (*count as f32 / self.total_samples.max(1) as f32 * 40.0) as usize;
            println!("    {:2}. {:30} {:5} {}", idx, name, count, "█".repeat(bar_len));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_image(path: &Path) {
        let img = image::ImageBuffer::from_fn(12, 12, |_, _| image::Rgb([0u8, 160u8, 40u8]));
        img.save(path).unwrap();
    }

    fn make_tree(counts: &[(&str, usize)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (class, n) in counts {
            let class_dir = dir.path().join(class);
            fs::create_dir_all(&class_dir).unwrap();
            for i in 0..*n {
                create_test_image(&class_dir.join(format!("img_{}.png", i)));
            }
        }
        dir
    }

    #[test]
    fn test_missing_directory() {
        let err = CottonLeafDataset::from_dir("/definitely/not/here").unwrap_err();
        assert!(matches!(err, CottonError::PathNotFound(_)));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = CottonLeafDataset::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, CottonError::Dataset(_)));
    }

    #[test]
    fn test_classes_without_images() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Aphids")).unwrap();
        fs::write(dir.path().join("Aphids").join("notes.txt"), "x").unwrap();
        assert!(CottonLeafDataset::from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_sorted_class_order() {
        let dir = make_tree(&[("powdery_mildew", 1), ("Aphids", 2), ("healthy", 1)]);
        let dataset = CottonLeafDataset::from_dir(dir.path()).unwrap();

        assert_eq!(dataset.class_names(), &["Aphids", "healthy", "powdery_mildew"]);
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.stats().class_counts, vec![2, 1, 1]);
        assert!(dataset.samples.iter().all(|s| dataset.class_names()[s.label] == s.class_name));
    }

    #[test]
    fn test_ignores_non_images_and_walks_nested() {
        let dir = make_tree(&[("Army worm", 1)]);
        let nested = dir.path().join("Army worm").join("batch2");
        fs::create_dir(&nested).unwrap();
        create_test_image(&nested.join("deep.jpg"));
        fs::write(dir.path().join("Army worm").join("readme.md"), "x").unwrap();

        let dataset = CottonLeafDataset::from_dir(dir.path()).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let dir = make_tree(&[("a", 5), ("b", 5)]);
        let mut first = CottonLeafDataset::from_dir(dir.path()).unwrap();
        let mut second = first.clone();
        first.shuffle(7);
        second.shuffle(7);
        assert_eq!(first.samples, second.samples);
    }

    #[test]
    fn test_holdout_is_stratified() {
        let dir = make_tree(&[("a", 10), ("b", 4)]);
        let dataset = CottonLeafDataset::from_dir(dir.path()).unwrap();

        let (train, holdout) = dataset.split_holdout(0.2, 42).unwrap();
        assert_eq!(train.len() + holdout.len(), 14);
        assert_eq!(holdout.iter().filter(|s| s.label == 0).count(), 2);
        assert_eq!(holdout.iter().filter(|s| s.label == 1).count(), 1);

        let (all, none) = dataset.split_holdout(0.0, 42).unwrap();
        assert_eq!(all.len(), 14);
        assert!(none.is_empty());

        assert!(dataset.split_holdout(1.5, 42).is_err());
    }
}
