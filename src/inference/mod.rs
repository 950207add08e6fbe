//! Inference: loading a trained classifier and turning its output into a
//! diagnosis with guidance.

pub mod diagnosis;
pub mod predictor;

pub use diagnosis::{advisory, confidence_percent, Diagnosis, LOW_CONFIDENCE_THRESHOLD, LOW_CONFIDENCE_WARNING};
pub use predictor::{PredictionResult, Predictor, RankedClass};
