//! Prediction → diagnosis with guidance and the low-confidence advisory

use serde::{Deserialize, Serialize};

use super::predictor::PredictionResult;
use crate::guidance::{guide_for, DiseaseGuide};

/// Below this confidence (percent) a diagnosis carries a warning
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 60.0;

pub const LOW_CONFIDENCE_WARNING: &str = "कम विश्वसनीयता: कृपया कृषि विशेषज्ञ से सलाह लें।";

/// Probability in `[0, 1]` → percent rounded to two decimals
pub fn confidence_percent(confidence: f32) -> f64 {
    (confidence as f64 * 10_000.0).round() / 100.0
}

/// Warning text for a rounded confidence percentage, if any
pub fn advisory(confidence_pct: f64) -> Option<&'static str> {
    (confidence_pct < LOW_CONFIDENCE_THRESHOLD).then_some(LOW_CONFIDENCE_WARNING)
}

/// What the API returns for an uploaded leaf image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Raw class label as trained
    pub disease: String,
    /// Percent, two decimals
    pub confidence: f64,
    pub disease_info_hi: DiseaseGuide,
    pub warning: Option<String>,
}

impl Diagnosis {
    pub fn new(class_name: &str, confidence: f32) -> Self {
        let pct = confidence_percent(confidence);
        Self {
            disease: class_name.to_string(),
            confidence: pct,
            disease_info_hi: guide_for(class_name),
            warning: advisory(pct).map(str::to_string),
        }
    }

    pub fn from_prediction(prediction: &PredictionResult) -> Self {
        Self::new(&prediction.class_name, prediction.confidence)
    }

    pub fn is_low_confidence(&self) -> bool {
        self.warning.is_some()
    }
}
