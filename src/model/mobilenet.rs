//! MobileNetV2 feature extractor
//!
//! Width multiplier 1.0, no classifier. The network is addressed as
//! [`NUM_STAGES`] stages so that a prefix can be run frozen:
//!
//! | stage | layer                                 |
//! |-------|---------------------------------------|
//! | 0     | stem conv 3x3, 3 → 32, stride 2       |
//! | 1-17  | inverted residual blocks              |
//! | 18    | last conv 1x1, 320 → 1280             |
//!
//! The field layout mirrors torchvision's `features.N` indices so the
//! ImageNet checkpoint can be remapped onto it (see [`super::weights`]).
//!
//! Batch norms always normalize with their stored statistics, also while
//! fine-tuning: the base behaves like a Keras model called with
//! `training=False`. Gradients still reach `gamma`/`beta` and the convs of
//! unfrozen stages.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

/// Channels produced by the last stage
pub const FEATURE_CHANNELS: usize = 1280;

/// Stem + 17 blocks + last conv
pub const NUM_STAGES: usize = 19;

/// Inverted residual settings: expansion `t`, output channels `c`,
/// repeats `n`, first stride `s`
const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

const STEM_CHANNELS: usize = 32;
const BN_EPSILON: f64 = 1e-5;

fn relu6<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clamp(0.0, 6.0)
}

/// Batch norm in inference mode on any backend
fn normalize<B: Backend>(norm: &BatchNorm<B, 2>, x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [channels] = norm.gamma.dims();
    let shape = [1, channels, 1, 1];

    let mean = norm.running_mean.value().reshape(shape);
    let std = norm.running_var.value().add_scalar(norm.epsilon).sqrt().reshape(shape);
    let gamma = norm.gamma.val().reshape(shape);
    let beta = norm.beta.val().reshape(shape);

    (x - mean) / std * gamma + beta
}

/// Conv (no bias) → BatchNorm → ReLU6
#[derive(Module, Debug)]
pub struct ConvBnRelu6<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBnRelu6<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let padding = (kernel_size - 1) / 2;
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .init(device);
        let norm = BatchNormConfig::new(out_channels)
            .with_epsilon(BN_EPSILON)
            .init(device);

        Self { conv, norm }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu6(normalize(&self.norm, self.conv.forward(x)))
    }
}

/// Expand 1x1 → depthwise 3x3 → linear project 1x1, with a skip
/// connection when the block keeps the input shape.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// Absent when the expansion factor is 1
    pub expand: Option<ConvBnRelu6<B>>,
    pub depthwise: ConvBnRelu6<B>,
    pub project: Conv2d<B>,
    pub project_norm: BatchNorm<B, 2>,
}

impl<B: Backend> InvertedResidual<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expand_ratio: usize,
        device: &B::Device,
    ) -> Self {
        let hidden = in_channels * expand_ratio;
        let expand = (expand_ratio != 1).then(|| ConvBnRelu6::new(in_channels, hidden, 1, 1, 1, device));
        let depthwise = ConvBnRelu6::new(hidden, hidden, 3, stride, hidden, device);
        let project = Conv2dConfig::new([hidden, out_channels], [1, 1])
            .with_bias(false)
            .init(device);
        let project_norm = BatchNormConfig::new(out_channels)
            .with_epsilon(BN_EPSILON)
            .init(device);

        Self {
            expand,
            depthwise,
            project,
            project_norm,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = match &self.expand {
            Some(expand) => expand.forward(x.clone()),
            None => x.clone(),
        };
        let out = self.depthwise.forward(out);
        let out = normalize(&self.project_norm, self.project.forward(out));

        // Stride 1 with equal channel counts
        if out.dims() == x.dims() {
            out + x
        } else {
            out
        }
    }
}

/// MobileNetV2 convolutional base
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    pub stem: ConvBnRelu6<B>,
    pub blocks: Vec<InvertedResidual<B>>,
    pub last_conv: ConvBnRelu6<B>,
}

impl<B: Backend> MobileNetV2<B> {
    /// Randomly initialized network; load pretrained weights with
    /// [`super::weights::load_pretrained`]
    pub fn new(device: &B::Device) -> Self {
        let stem = ConvBnRelu6::new(3, STEM_CHANNELS, 3, 2, 1, device);

        let mut blocks = Vec::with_capacity(NUM_STAGES - 2);
        let mut in_channels = STEM_CHANNELS;
        for (t, c, n, s) in INVERTED_RESIDUAL_SETTINGS {
            for i in 0..n {
                let stride = if i == 0 { s } else { 1 };
                blocks.push(InvertedResidual::new(in_channels, c, stride, t, device));
                in_channels = c;
            }
        }

        let last_conv = ConvBnRelu6::new(in_channels, FEATURE_CHANNELS, 1, 1, 1, device);

        Self {
            stem,
            blocks,
            last_conv,
        }
    }

    /// Run stages `start..end` (see module docs for the numbering)
    pub fn forward_stages(&self, x: Tensor<B, 4>, start: usize, end: usize) -> Tensor<B, 4> {
        let end = end.min(NUM_STAGES);
        let mut x = x;
        for stage in start..end {
            x = match stage {
                0 => self.stem.forward(x),
                s if s == NUM_STAGES - 1 => self.last_conv.forward(x),
                s => self.blocks[s - 1].forward(x),
            };
        }
        x
    }

    /// Full feature map `[batch, 1280, H/32, W/32]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_stages(x, 0, NUM_STAGES)
    }
}
