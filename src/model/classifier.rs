//! Cotton disease classifier: MobileNetV2 base plus a pooling/dropout/linear head

use burn::{
    config::Config,
    module::{AutodiffModule, Module},
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
    },
    tensor::{
        activation::softmax,
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

use super::mobilenet::{MobileNetV2, FEATURE_CHANNELS, NUM_STAGES};

#[derive(Config, Debug)]
pub struct CottonClassifierConfig {
    /// Number of disease/pest classes (length of `class_names.json`)
    pub num_classes: usize,

    /// Square input size in pixels
    #[config(default = "160")]
    pub image_size: usize,

    #[config(default = "0.2")]
    pub dropout: f64,
}

/// Global average pooling → dropout → linear logits
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub pool: AdaptiveAvgPool2d,
    pub dropout: Dropout,
    pub linear: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(num_classes: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(dropout).init(),
            linear: LinearConfig::new(FEATURE_CHANNELS, num_classes)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device),
        }
    }

    /// Feature map `[batch, 1280, h, w]` → logits `[batch, num_classes]`
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, channels, _, _] = features.dims();
        let pooled = self.pool.forward(features).reshape([batch, channels]);
        self.linear.forward(self.dropout.forward(pooled))
    }
}

#[derive(Module, Debug)]
pub struct CottonClassifier<B: Backend> {
    pub backbone: MobileNetV2<B>,
    pub head: ClassifierHead<B>,
}

impl<B: Backend> CottonClassifier<B> {
    /// Classifier with a randomly initialized base
    pub fn new(config: &CottonClassifierConfig, device: &B::Device) -> Self {
        Self::with_backbone(config, MobileNetV2::new(device), device)
    }

    /// Classifier on top of an existing (usually pretrained) base
    pub fn with_backbone(config: &CottonClassifierConfig, backbone: MobileNetV2<B>, device: &B::Device) -> Self {
        Self {
            backbone,
            head: ClassifierHead::new(config.num_classes, config.dropout, device),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.head.linear.weight.dims()[1]
    }

    /// Logits `[batch, num_classes]` for normalized images
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(images))
    }

    /// Softmax probabilities `[batch, num_classes]`
    pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}

impl<B: AutodiffBackend> CottonClassifier<B> {
    /// Training forward pass with the first `split` stages of the base frozen.
    ///
    /// `frozen` is the base network on the inner backend (from
    /// `self.backbone.valid()`), so the prefix records no gradients.
    /// Stages `split..` and the head run on the autodiff backend.
    pub fn forward_partially_frozen(
        &self,
        frozen: &MobileNetV2<B::InnerBackend>,
        images: Tensor<B, 4>,
        split: usize,
    ) -> Tensor<B, 2> {
        let split = split.min(NUM_STAGES);
        let features = frozen.forward_stages(images.inner(), 0, split);
        let features = Tensor::<B, 4>::from_inner(features);
        let features = self.backbone.forward_stages(features, split, NUM_STAGES);
        self.head.forward(features)
    }

    /// Snapshot of the base for [`Self::forward_partially_frozen`]
    pub fn frozen_backbone(&self) -> MobileNetV2<B::InnerBackend> {
        self.backbone.valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    #[test]
    fn test_config_defaults() {
        let config = CottonClassifierConfig::new(6);
        assert_eq!(config.num_classes, 6);
        assert_eq!(config.image_size, 160);
        assert!((config.dropout - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let device = Default::default();
        let model = CottonClassifier::<TestBackend>::new(&CottonClassifierConfig::new(4), &device);
        assert_eq!(model.num_classes(), 4);

        let x = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let probs = model.forward_probabilities(x);
        assert_eq!(probs.dims(), [2, 4]);

        let sums = probs.sum_dim(1).into_data().to_vec::<f32>().unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_fully_frozen_base_gets_no_gradients() {
        let device = Default::default();
        let model = CottonClassifier::<TestAutodiff>::new(&CottonClassifierConfig::new(3), &device);
        let frozen = model.frozen_backbone();

        let x = Tensor::<TestAutodiff, 4>::ones([1, 3, 32, 32], &device);
        let logits = model.forward_partially_frozen(&frozen, x, NUM_STAGES);
        let grads = logits.sum().backward();

        assert!(model.head.linear.weight.grad(&grads).is_some());
        assert!(model.backbone.stem.conv.weight.grad(&grads).is_none());
        assert!(model.backbone.last_conv.conv.weight.grad(&grads).is_none());
    }

    #[test]
    fn test_partial_unfreeze_gradients() {
        let device = Default::default();
        let model = CottonClassifier::<TestAutodiff>::new(&CottonClassifierConfig::new(3), &device);
        let frozen = model.frozen_backbone();

        let x = Tensor::<TestAutodiff, 4>::ones([1, 3, 32, 32], &device);
        let logits = model.forward_partially_frozen(&frozen, x, 12);
        let grads = logits.sum().backward();

        assert!(model.backbone.blocks[0].depthwise.conv.weight.grad(&grads).is_none());
        assert!(model.backbone.blocks[12].project.weight.grad(&grads).is_some());
        assert!(model.backbone.last_conv.conv.weight.grad(&grads).is_some());
    }
}
