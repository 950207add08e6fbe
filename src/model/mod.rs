//! Model definitions: the MobileNetV2 base, its pretrained weights, and the
//! classification head.

pub mod classifier;
pub mod mobilenet;
pub mod weights;

pub use classifier::{ClassifierHead, CottonClassifier, CottonClassifierConfig};
pub use mobilenet::{MobileNetV2, FEATURE_CHANNELS, NUM_STAGES};
pub use weights::PretrainedWeights;
