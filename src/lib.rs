//! # Cotton Disease
//!
//! Cotton leaf disease and pest classification with the Burn framework.
//! A pretrained MobileNetV2 feature extractor is adapted to the cotton
//! classes in two phases (frozen extractor, then partial fine-tuning), and
//! every prediction is paired with Hindi agronomic guidance.
//!
//! ## Modules
//!
//! - `dataset`: Directory loading, shared preprocessing, augmentation and batching
//! - `model`: MobileNetV2 backbone, classification head and pretrained weights
//! - `training`: Two-phase transfer-learning driver with early stopping
//! - `inference`: Predictor and diagnosis with the low-confidence advisory
//! - `guidance`: Hindi guidance table and label canonicalization
//! - `report`: Printable PDF report
//! - `utils`: Errors, logging and training charts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cotton_disease::{backend::default_device, Diagnosis, Predictor};
//!
//! let predictor = Predictor::<cotton_disease::backend::DefaultBackend>::load("artifacts", &default_device())?;
//! let prediction = predictor.predict_file("leaf.jpg")?;
//! let diagnosis = Diagnosis::from_prediction(&prediction);
//! ```

pub mod backend;
pub mod dataset;
pub mod guidance;
pub mod inference;
pub mod model;
pub mod report;
pub mod training;
pub mod utils;

pub use dataset::{CottonLeafDataset, LeafBatch, LeafBatcher, LeafImageDataset, LeafItem};
pub use guidance::{guide_for, DiseaseGuide, DiseaseKey};
pub use inference::{Diagnosis, PredictionResult, Predictor};
pub use model::{CottonClassifier, CottonClassifierConfig, MobileNetV2, PretrainedWeights};
pub use report::ReportRenderer;
pub use training::{run_training, ArtifactPaths, TrainingConfig, TrainingHistory};
pub use utils::error::{CottonError, Result};

/// Default square input resolution
pub const IMG_SIZE: usize = 160;

pub const BATCH_SIZE: usize = 32;

/// Phase 1 learning rate; fine-tuning uses a tenth of it
pub const LEARNING_RATE: f64 = 1e-4;

/// Upper bound on epochs per phase
pub const EPOCHS: usize = 50;

pub const EARLY_STOPPING_PATIENCE: usize = 3;

/// First backbone stage unfrozen during fine-tuning
pub const FINE_TUNE_AT: usize = 12;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
