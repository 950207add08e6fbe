//! Two-phase transfer learning
//!
//! 1. Feature extraction: the whole pretrained base is frozen and only the
//!    head trains, with Adam at the base learning rate.
//! 2. Fine-tuning: base stages from `fine_tune_at` upward are unfrozen and
//!    trained together with the head, with RMSProp at a tenth of the rate.
//!
//! Both phases minimize sparse categorical cross-entropy and stop early when
//! the training loss has not improved for `patience` epochs, in which case
//! the phase's best weights are restored.

use std::path::Path;
use std::time::Instant;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig},
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::config::{ArtifactPaths, TrainingConfig};
use super::early_stopping::{EarlyStopping, EpochVerdict};
use super::history::{EpochRecord, PhaseHistory, TrainingHistory};
use crate::dataset::{
    save_class_names, AugmentingBatcher, CottonLeafDataset, ImageSample, LeafBatch, LeafBatcher,
    LeafImageDataset,
};
use crate::model::{weights, CottonClassifier, PretrainedWeights, NUM_STAGES};
use crate::utils::error::{CottonError, Result};
use crate::utils::logging::PhaseLogger;

/// Result of a finished training run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub history: TrainingHistory,
    pub artifacts: ArtifactPaths,
    pub train_samples: usize,
    pub val_samples: usize,
    pub duration_secs: f64,
}

/// Everything one phase needs besides the model and optimizer
struct PhaseContext<'a, B: AutodiffBackend> {
    train: &'a LeafImageDataset,
    val: Option<&'a LeafImageDataset>,
    batcher: &'a AugmentingBatcher,
    config: &'a TrainingConfig,
    device: &'a B::Device,
}

/// Weights of the lowest-loss epoch of a phase
struct BestWeights<M> {
    model: M,
}

impl<M: Clone> BestWeights<M> {
    fn new(model: &M) -> Self {
        Self { model: model.clone() }
    }

    fn snapshot(&mut self, model: &M) {
        self.model = model.clone();
    }

    /// The snapshot after an early stop, otherwise the final weights
    fn resolve(self, last: M, stopped_early: bool) -> M {
        if stopped_early {
            self.model
        } else {
            last
        }
    }
}

/// Train on `data_dir` and write all artifacts to `artifacts_dir`
pub fn run_training<B: AutodiffBackend>(
    data_dir: &Path,
    artifacts_dir: &Path,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingSummary> {
    config.validate()?;
    let started = Instant::now();

    let dataset = CottonLeafDataset::from_dir(data_dir)?;
    let class_names = dataset.class_names().to_vec();
    info!("Class order: {:?}", class_names);

    let (train_samples, val_samples) = dataset.split_holdout(config.validation_fraction, config.seed)?;
    let train = build_dataset(&train_samples, config);
    let val = (!val_samples.is_empty()).then(|| build_dataset(&val_samples, config));
    if train.len() == 0 {
        return Err(CottonError::Training("no readable training images".to_string()));
    }

    let pretrained = PretrainedWeights::parse(&config.pretrained);
    let backbone = weights::load_pretrained::<B>(&pretrained, device)?;
    let model = CottonClassifier::with_backbone(&config.model_config(class_names.len()), backbone, device);

    let batcher = AugmentingBatcher::new(config.image_size, config.augmentation.clone(), config.seed);
    let ctx = PhaseContext::<B> {
        train: &train,
        val: val.as_ref(),
        batcher: &batcher,
        config,
        device,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut history = TrainingHistory::new(class_names.clone());

    // Phase 1: head only
    let mut phase = PhaseHistory::new("feature extraction", "adam", config.learning_rate, NUM_STAGES);
    let optimizer = AdamConfig::new()
        .with_epsilon(1e-7)
        .init::<B, CottonClassifier<B>>();
    let mut model = run_phase(model, optimizer, NUM_STAGES, &mut phase, &ctx, &mut rng);
    history.phases.push(phase);

    // Phase 2: upper base stages + head
    if !config.skip_fine_tuning {
        let lr = config.fine_tune_learning_rate();
        let mut phase = PhaseHistory::new("fine-tuning", "rmsprop", lr, config.fine_tune_at);
        let optimizer = RmsPropConfig::new()
            .with_alpha(0.9)
            .with_epsilon(1e-7)
            .init::<B, CottonClassifier<B>>();
        model = run_phase(model, optimizer, config.fine_tune_at, &mut phase, &ctx, &mut rng);
        history.phases.push(phase);
    }

    let artifacts = ArtifactPaths::new(artifacts_dir);
    save_artifacts(&model, &class_names, config, &history, &artifacts)?;

    Ok(TrainingSummary {
        history,
        artifacts,
        train_samples: train.len(),
        val_samples: val.as_ref().map(|v| v.len()).unwrap_or(0),
        duration_secs: started.elapsed().as_secs_f64(),
    })
}

fn build_dataset(samples: &[ImageSample], config: &TrainingConfig) -> LeafImageDataset {
    if config.cache_images {
        LeafImageDataset::new_cached(samples, config.image_size)
    } else {
        LeafImageDataset::new(samples, config.image_size)
    }
}

/// Train one phase with stages `trainable_from..` of the base unfrozen
fn run_phase<B, O>(
    mut model: CottonClassifier<B>,
    mut optimizer: O,
    trainable_from: usize,
    phase: &mut PhaseHistory,
    ctx: &PhaseContext<'_, B>,
    rng: &mut ChaCha8Rng,
) -> CottonClassifier<B>
where
    B: AutodiffBackend,
    O: Optimizer<CottonClassifier<B>, B>,
{
    let config = ctx.config;
    let lr = phase.learning_rate;
    let mut logger = PhaseLogger::new(&phase.name, config.epochs);
    let mut stopping = EarlyStopping::new(config.patience);
    let mut best = BestWeights::new(&model);
    let loss_fn = CrossEntropyLossConfig::new().init(ctx.device);

    let mut indices: Vec<usize> = (0..ctx.train.len()).collect();

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);
        indices.shuffle(rng);

        // Frozen stages are constant within an epoch
        let frozen = model.frozen_backbone();

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;
        let num_batches = indices.len().div_ceil(config.batch_size);

        for (batch_idx, chunk) in indices.chunks(config.batch_size).enumerate() {
            let items: Vec<_> = chunk.iter().filter_map(|&i| ctx.train.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let batch: LeafBatch<B> = ctx.batcher.batch(items, ctx.device);
            let batch_size = batch.targets.dims()[0];

            let logits = model.forward_partially_frozen(&frozen, batch.images, trainable_from);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            let batch_correct: i64 = logits
                .argmax(1)
                .reshape([batch_size])
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem();

            loss_sum += loss_value * batch_size as f64;
            correct += batch_correct as usize;
            seen += batch_size;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    100.0 * correct as f64 / seen.max(1) as f64
                );
            }
        }

        let loss = loss_sum / seen.max(1) as f64;
        let accuracy = correct as f64 / seen.max(1) as f64;
        let val_accuracy = ctx.val.map(|val| evaluate(&model, val, config, ctx.device));
        logger.end_epoch(loss, accuracy, val_accuracy, lr);

        phase.epochs.push(EpochRecord {
            epoch,
            loss,
            accuracy,
            val_accuracy,
        });

        match stopping.update(epoch, loss) {
            EpochVerdict::Improved => {
                best.snapshot(&model);
                phase.best_epoch = Some(epoch);
            }
            EpochVerdict::Continue => {}
            EpochVerdict::Stop => {
                logger.log_early_stop(stopping.patience(), stopping.best_epoch());
                phase.stopped_early = true;
                break;
            }
        }
    }

    logger.log_complete(phase.epochs.len(), stopping.best_loss());
    best.resolve(model, phase.stopped_early)
}

/// Accuracy in `[0, 1]` on a dataset, with dropout off and batch norm in
/// inference mode
pub fn evaluate<B: AutodiffBackend>(
    model: &CottonClassifier<B>,
    dataset: &LeafImageDataset,
    config: &TrainingConfig,
    device: &B::Device,
) -> f64 {
    let inner = model.valid();
    let batcher = LeafBatcher::new(config.image_size);
    let mut correct = 0usize;
    let mut total = 0usize;

    let len = dataset.len();
    for start in (0..len).step_by(config.batch_size) {
        let end = (start + config.batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: LeafBatch<B> = batcher.batch(items, device);
        let batch_size = batch.targets.dims()[0];
        let predictions = inner.forward(batch.images.inner()).argmax(1).reshape([batch_size]);

        let batch_correct: i64 = predictions
            .equal(batch.targets.inner())
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        total += batch_size;
    }

    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

fn save_artifacts<B: AutodiffBackend>(
    model: &CottonClassifier<B>,
    class_names: &[String],
    config: &TrainingConfig,
    history: &TrainingHistory,
    artifacts: &ArtifactPaths,
) -> Result<()> {
    std::fs::create_dir_all(&artifacts.dir)?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(artifacts.model(), &recorder)
        .map_err(|e| CottonError::Model(format!("failed to save weights: {}", e)))?;

    save_class_names(&artifacts.class_names(), class_names)?;
    config.save(&artifacts.training_config())?;
    history.save(&artifacts.history())?;
    history.save_curves(&artifacts.curves())?;

    info!("Artifacts written to {:?}", artifacts.dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AugmentationConfig;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn write_tree(root: &Path) {
        for (class, color) in [("Aphids", [200u8, 30, 30]), ("healthy", [30u8, 200, 30])] {
            let dir = root.join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..3u8 {
                let img = image::RgbImage::from_pixel(40, 40, image::Rgb([color[0], color[1].wrapping_add(i), color[2]]));
                img.save(dir.join(format!("{}.png", i))).unwrap();
            }
        }
    }

    fn tiny_config() -> TrainingConfig {
        TrainingConfig {
            image_size: 32,
            batch_size: 4,
            epochs: 2,
            patience: 1,
            augmentation: AugmentationConfig::light(),
            pretrained: "none".to_string(),
            validation_fraction: 0.34,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_two_phase_run_writes_artifacts() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_tree(data.path());

        let device = Default::default();
        let summary = run_training::<TestBackend>(data.path(), out.path(), &tiny_config(), &device).unwrap();

        assert_eq!(summary.history.phases.len(), 2);
        assert_eq!(summary.train_samples + summary.val_samples, 6);
        assert!(summary.history.phases.iter().all(|p| !p.epochs.is_empty() && p.epochs.len() <= 2));
        assert_eq!(summary.history.phases[1].trainable_from, 12);
        assert!((summary.history.phases[1].learning_rate - 1e-5).abs() < 1e-12);
        assert!(summary.history.phases[0].epochs[0].val_accuracy.is_some());

        let artifacts = &summary.artifacts;
        assert!(artifacts.model_file().exists());
        assert!(artifacts.class_names().exists());
        assert!(artifacts.training_config().exists());
        assert!(artifacts.history().exists());
        assert!(artifacts.curves().exists());
    }

    #[test]
    fn test_skip_fine_tuning() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_tree(data.path());

        let config = TrainingConfig {
            epochs: 1,
            skip_fine_tuning: true,
            validation_fraction: 0.0,
            ..tiny_config()
        };
        let device = Default::default();
        let summary = run_training::<TestBackend>(data.path(), out.path(), &config, &device).unwrap();
        assert_eq!(summary.history.phases.len(), 1);
        assert_eq!(summary.val_samples, 0);
    }

    fn head_weights(model: &CottonClassifier<TestBackend>) -> burn::tensor::TensorData {
        model.head.linear.weight.val().into_data()
    }

    /// Runs the head-only phase on the tiny tree from a fixed start
    fn head_phase(
        data: &Path,
        start: &CottonClassifier<TestBackend>,
        learning_rate: f64,
        epochs: usize,
        patience: usize,
    ) -> (CottonClassifier<TestBackend>, PhaseHistory) {
        let config = TrainingConfig {
            epochs,
            patience,
            augmentation: AugmentationConfig::none(),
            ..tiny_config()
        };
        let (samples, _) = CottonLeafDataset::from_dir(data)
            .unwrap()
            .split_holdout(0.0, config.seed)
            .unwrap();
        let train = build_dataset(&samples, &config);
        let batcher = AugmentingBatcher::new(config.image_size, config.augmentation.clone(), config.seed);
        let device = Default::default();
        let ctx = PhaseContext::<TestBackend> {
            train: &train,
            val: None,
            batcher: &batcher,
            config: &config,
            device: &device,
        };

        let mut phase = PhaseHistory::new("feature extraction", "adam", learning_rate, NUM_STAGES);
        let optimizer = AdamConfig::new().init::<TestBackend, CottonClassifier<TestBackend>>();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let model = run_phase(start.clone(), optimizer, NUM_STAGES, &mut phase, &ctx, &mut rng);
        (model, phase)
    }

    fn start_model() -> CottonClassifier<TestBackend> {
        let config = crate::model::CottonClassifierConfig::new(2)
            .with_image_size(32)
            .with_dropout(0.0);
        CottonClassifier::new(&config, &Default::default())
    }

    #[test]
    fn test_early_stop_restores_best_epoch() {
        let data = TempDir::new().unwrap();
        write_tree(data.path());
        let start = start_model();

        // A negative rate climbs the loss, so epoch 1 never beats epoch 0
        let (restored, phase) = head_phase(data.path(), &start, -0.5, 5, 1);
        assert!(phase.stopped_early);
        assert_eq!(phase.best_epoch, Some(0));
        assert_eq!(phase.epochs.len(), 2);

        // Same start, seed and data for one epoch gives the epoch 0 weights
        let (after_first_epoch, single) = head_phase(data.path(), &start, -0.5, 1, 1);
        assert!(!single.stopped_early);
        assert_eq!(head_weights(&restored), head_weights(&after_first_epoch));
        assert_ne!(head_weights(&restored), head_weights(&start));
    }

    #[test]
    fn test_full_phase_keeps_final_weights() {
        let data = TempDir::new().unwrap();
        write_tree(data.path());
        let start = start_model();

        let (trained, phase) = head_phase(data.path(), &start, 1e-3, 2, 2);
        assert!(!phase.stopped_early);
        assert_eq!(phase.epochs.len(), 2);
        assert_ne!(head_weights(&trained), head_weights(&start));

        let (after_first_epoch, _) = head_phase(data.path(), &start, 1e-3, 1, 2);
        assert_ne!(head_weights(&trained), head_weights(&after_first_epoch));
    }

    #[test]
    fn test_best_weights_resolution() {
        let mut best = BestWeights::new(&0u32);
        best.snapshot(&3);
        assert_eq!(best.resolve(7, true), 3);

        let mut best = BestWeights::new(&0u32);
        best.snapshot(&3);
        assert_eq!(best.resolve(7, false), 7);
    }

    #[test]
    fn test_missing_data_dir() {
        let out = TempDir::new().unwrap();
        let device = Default::default();
        let result = run_training::<TestBackend>(Path::new("/no/dataset"), out.path(), &tiny_config(), &device);
        assert!(matches!(result, Err(CottonError::PathNotFound(_))));
    }
}
