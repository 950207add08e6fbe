//! Loading trained artifacts and classifying single images

use std::path::Path;
use std::time::{Duration, Instant};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::Backend, Tensor, TensorData},
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{load_class_names, preprocess};
use crate::model::CottonClassifier;
use crate::training::{ArtifactPaths, TrainingConfig};
use crate::utils::error::{CottonError, Result};

/// Number of ranked classes kept in a [`PredictionResult`]
pub const TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedClass {
    pub class_index: usize,
    pub class_name: String,
    pub probability: f32,
}

/// Output of one forward pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class_index: usize,
    pub class_name: String,
    /// Probability of the predicted class, in `[0, 1]`
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub top_k: Vec<RankedClass>,
    pub inference_time_ms: f64,
}

impl PredictionResult {
    pub fn new(probabilities: Vec<f32>, class_names: &[String], elapsed: Duration) -> Self {
        let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        // Stable sort keeps the lowest index first on ties, like argmax
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let name = |idx: usize| class_names.get(idx).cloned().unwrap_or_else(|| format!("class_{}", idx));
        let (class_index, confidence) = ranked.first().copied().unwrap_or((0, 0.0));

        let top_k = ranked
            .iter()
            .take(TOP_K)
            .map(|&(idx, p)| RankedClass {
                class_index: idx,
                class_name: name(idx),
                probability: p,
            })
            .collect();

        Self {
            class_index,
            class_name: name(class_index),
            confidence,
            probabilities,
            top_k,
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Trained classifier plus the class order it was trained with
pub struct Predictor<B: Backend> {
    model: CottonClassifier<B>,
    class_names: Vec<String>,
    image_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Wrap an in-memory model; `class_names` must match its output width
    pub fn from_model(
        model: CottonClassifier<B>,
        class_names: Vec<String>,
        image_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        if model.num_classes() != class_names.len() {
            return Err(CottonError::Config(format!(
                "model has {} outputs but {} class names were given",
                model.num_classes(),
                class_names.len()
            )));
        }
        Ok(Self {
            model,
            class_names,
            image_size,
            device,
        })
    }

    /// Rebuild the classifier from an artifacts directory written by training
    pub fn load<P: AsRef<Path>>(artifacts_dir: P, device: &B::Device) -> Result<Self> {
        let paths = ArtifactPaths::new(artifacts_dir);
        let class_names = load_class_names(&paths.class_names())?;

        let training_config = match TrainingConfig::load(&paths.training_config()) {
            Ok(config) => config,
            Err(CottonError::PathNotFound(path)) => {
                warn!("{:?} missing, assuming default image size and dropout", path);
                TrainingConfig::default()
            }
            Err(e) => return Err(e),
        };

        let model_file = paths.model_file();
        if !model_file.exists() {
            return Err(CottonError::PathNotFound(model_file));
        }

        let config = training_config.model_config(class_names.len());
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let model = CottonClassifier::<B>::new(&config, device)
            .load_file(paths.model(), &recorder, device)
            .map_err(|e| CottonError::Model(format!("failed to load {:?}: {}", model_file, e)))?;

        info!(
            "Loaded classifier with {} classes ({}px) from {:?}",
            class_names.len(),
            config.image_size,
            paths.dir
        );
        Self::from_model(model, class_names, config.image_size, device.clone())
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn predict_image(&self, image: &DynamicImage) -> Result<PredictionResult> {
        let start = Instant::now();
        let rgb = preprocess::prepare_image(image, self.image_size as u32);
        let data = preprocess::to_chw_tensor_data(&rgb);

        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(data, [1, 3, self.image_size, self.image_size]),
            &self.device,
        );
        let probabilities = self
            .model
            .forward_probabilities(input)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| CottonError::Inference(format!("{:?}", e)))?;

        let result = PredictionResult::new(probabilities, &self.class_names, start.elapsed());
        debug!(
            "Predicted '{}' ({:.2}%) in {:.1} ms",
            result.class_name,
            result.confidence * 100.0,
            result.inference_time_ms
        );
        Ok(result)
    }

    /// Classify encoded image bytes (JPEG, PNG, ...)
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult> {
        self.predict_image(&preprocess::decode_image(bytes)?)
    }

    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<PredictionResult> {
        self.predict_image(&preprocess::open_image(path.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::save_class_names;
    use crate::model::CottonClassifierConfig;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class_{}", i)).collect()
    }

    fn small_predictor(n: usize) -> Predictor<TestBackend> {
        let device = Default::default();
        let config = CottonClassifierConfig::new(n).with_image_size(32);
        let model = CottonClassifier::<TestBackend>::new(&config, &device);
        Predictor::from_model(model, names(n), 32, device).unwrap()
    }

    #[test]
    fn test_prediction_result_ranking() {
        let result = PredictionResult::new(vec![0.1, 0.6, 0.3], &names(3), Duration::from_millis(2));
        assert_eq!(result.class_index, 1);
        assert_eq!(result.class_name, "class_1");
        assert!((result.confidence - 0.6).abs() < 1e-6);
        assert_eq!(result.top_k[1].class_index, 2);
        assert_eq!(result.top_k.len(), 3);
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let result = PredictionResult::new(vec![0.5, 0.5], &names(2), Duration::ZERO);
        assert_eq!(result.class_index, 0);
    }

    #[test]
    fn test_class_count_mismatch() {
        let device = Default::default();
        let model = CottonClassifier::<TestBackend>::new(&CottonClassifierConfig::new(3), &device);
        assert!(Predictor::from_model(model, names(2), 160, device).is_err());
    }

    #[test]
    fn test_predict_image_distribution() {
        let predictor = small_predictor(4);
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(50, 70, image::Rgb([20, 180, 40])));

        let result = predictor.predict_image(&img).unwrap();
        assert_eq!(result.probabilities.len(), 4);
        let total: f32 = result.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(result.class_index < 4);
    }

    #[test]
    fn test_predict_bytes_rejects_garbage() {
        let predictor = small_predictor(2);
        assert!(matches!(predictor.predict_bytes(b"not an image"), Err(CottonError::ImageDecode(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let paths = ArtifactPaths::new(dir.path());

        let training = TrainingConfig {
            image_size: 32,
            ..TrainingConfig::default()
        };
        let model = CottonClassifier::<TestBackend>::new(&training.model_config(3), &device);
        model
            .clone()
            .save_file(paths.model(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
            .unwrap();
        save_class_names(&paths.class_names(), &names(3)).unwrap();
        training.save(&paths.training_config()).unwrap();

        let loaded = Predictor::<TestBackend>::load(dir.path(), &device).unwrap();
        assert_eq!(loaded.num_classes(), 3);
        assert_eq!(loaded.image_size(), 32);

        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(32, 32, image::Rgb([90, 90, 90])));
        let original = Predictor::from_model(model, names(3), 32, device).unwrap();
        let a = original.predict_image(&img).unwrap().probabilities;
        let b = loaded.predict_image(&img).unwrap().probabilities;
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-5));
    }

    #[test]
    fn test_load_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        assert!(matches!(
            Predictor::<TestBackend>::load(dir.path(), &device),
            Err(CottonError::PathNotFound(_))
        ));
    }
}
