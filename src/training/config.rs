//! Training hyper-parameters, persisted next to the trained weights

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::AugmentationConfig;
use crate::model::{CottonClassifierConfig, NUM_STAGES};
use crate::utils::error::{CottonError, Result};
use crate::{BATCH_SIZE, EARLY_STOPPING_PATIENCE, EPOCHS, FINE_TUNE_AT, IMG_SIZE, LEARNING_RATE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub image_size: usize,
    pub batch_size: usize,
    /// Phase 1 learning rate; fine-tuning uses a tenth of it
    pub learning_rate: f64,
    /// Maximum epochs per phase
    pub epochs: usize,
    /// Epochs without training-loss improvement before a phase stops
    pub patience: usize,
    /// First trainable stage of the base during fine-tuning
    pub fine_tune_at: usize,
    pub dropout: f64,
    /// Skip the fine-tuning phase entirely
    pub skip_fine_tuning: bool,
    /// Fraction of each class held out to report validation accuracy
    pub validation_fraction: f64,
    pub augmentation: AugmentationConfig,
    /// Decode all images into memory before training
    pub cache_images: bool,
    pub seed: u64,
    /// `imagenet`, `none`, or a checkpoint path
    pub pretrained: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            image_size: IMG_SIZE,
            batch_size: BATCH_SIZE,
            learning_rate: LEARNING_RATE,
            epochs: EPOCHS,
            patience: EARLY_STOPPING_PATIENCE,
            fine_tune_at: FINE_TUNE_AT,
            dropout: 0.2,
            skip_fine_tuning: false,
            validation_fraction: 0.0,
            augmentation: AugmentationConfig::default(),
            cache_images: true,
            seed: 42,
            pretrained: "imagenet".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn fine_tune_learning_rate(&self) -> f64 {
        self.learning_rate / 10.0
    }

    pub fn model_config(&self, num_classes: usize) -> CottonClassifierConfig {
        CottonClassifierConfig::new(num_classes)
            .with_image_size(self.image_size)
            .with_dropout(self.dropout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_size < 32 {
            return Err(CottonError::Config(format!("image_size {} is below 32", self.image_size)));
        }
        if self.batch_size == 0 {
            return Err(CottonError::Config("batch_size must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(CottonError::Config(format!("learning_rate {} must be positive", self.learning_rate)));
        }
        if self.fine_tune_at >= NUM_STAGES {
            return Err(CottonError::Config(format!(
                "fine_tune_at {} leaves no trainable stage (base has {})",
                self.fine_tune_at, NUM_STAGES
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(CottonError::Config(format!("dropout {} outside [0, 1)", self.dropout)));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(CottonError::Config(format!(
                "validation_fraction {} outside [0, 1)",
                self.validation_fraction
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CottonError::PathNotFound(path.to_path_buf()));
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// File layout of an artifacts directory
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Weights file stem; the recorder appends `.mpk`
    pub fn model(&self) -> PathBuf {
        self.dir.join("model")
    }

    pub fn model_file(&self) -> PathBuf {
        self.dir.join("model.mpk")
    }

    pub fn class_names(&self) -> PathBuf {
        self.dir.join("class_names.json")
    }

    pub fn training_config(&self) -> PathBuf {
        self.dir.join("training_config.json")
    }

    pub fn history(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    pub fn curves(&self) -> PathBuf {
        self.dir.join("training_curves.svg")
    }
}
