//! Per-epoch metrics of both training phases

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::charts;
use crate::utils::error::{CottonError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    /// Training accuracy in `[0, 1]`
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseHistory {
    pub name: String,
    pub optimizer: String,
    pub learning_rate: f64,
    /// First trainable stage of the base
    pub trainable_from: usize,
    pub epochs: Vec<EpochRecord>,
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
}

impl PhaseHistory {
    pub fn new(name: &str, optimizer: &str, learning_rate: f64, trainable_from: usize) -> Self {
        Self {
            name: name.to_string(),
            optimizer: optimizer.to_string(),
            learning_rate,
            trainable_from,
            epochs: Vec::new(),
            best_epoch: None,
            stopped_early: false,
        }
    }

    pub fn best(&self) -> Option<&EpochRecord> {
        self.best_epoch.and_then(|e| self.epochs.get(e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub class_names: Vec<String>,
    pub phases: Vec<PhaseHistory>,
}

impl TrainingHistory {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            class_names,
            phases: Vec::new(),
        }
    }

    fn all_epochs(&self) -> impl Iterator<Item = &EpochRecord> {
        self.phases.iter().flat_map(|p| p.epochs.iter())
    }

    pub fn accuracy(&self) -> Vec<f64> {
        self.all_epochs().map(|e| e.accuracy).collect()
    }

    pub fn loss(&self) -> Vec<f64> {
        self.all_epochs().map(|e| e.loss).collect()
    }

    /// Validation accuracy, empty unless every epoch has one
    pub fn val_accuracy(&self) -> Vec<f64> {
        self.all_epochs().map(|e| e.val_accuracy).collect::<Option<Vec<_>>>().unwrap_or_default()
    }

    /// Index of the first fine-tuning epoch in the concatenated history
    pub fn fine_tune_start(&self) -> Option<usize> {
        if self.phases.len() < 2 {
            return None;
        }
        Some(self.phases[0].epochs.len())
    }

    /// Training accuracy of the weights the run ended with: the best epoch
    /// of the last phase if it stopped early, else its last epoch
    pub fn final_accuracy(&self) -> Option<f64> {
        let phase = self.phases.last()?;
        let record = if phase.stopped_early { phase.best() } else { phase.epochs.last() };
        record.map(|e| e.accuracy)
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

    /// Accuracy and loss curves as SVG
    pub fn save_curves(&self, path: &Path) -> Result<()> {
        charts::save_training_curves(
            path,
            &self.accuracy(),
            &self.val_accuracy(),
            &self.loss(),
            self.fine_tune_start(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(epoch: usize, loss: f64, accuracy: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            loss,
            accuracy,
            val_accuracy: None,
        }
    }

    fn two_phase() -> TrainingHistory {
        let mut history = TrainingHistory::new(vec!["Aphids".into(), "healthy".into()]);

        let mut head = PhaseHistory::new("feature extraction", "adam", 1e-4, 19);
        head.epochs = vec![record(0, 1.0, 0.5), record(1, 0.7, 0.7)];
        head.best_epoch = Some(1);

        let mut fine = PhaseHistory::new("fine-tuning", "rmsprop", 1e-5, 12);
        fine.epochs = vec![record(0, 0.5, 0.8), record(1, 0.6, 0.79)];
        fine.best_epoch = Some(0);
        fine.stopped_early = true;

        history.phases = vec![head, fine];
        history
    }

    #[test]
    fn test_concatenated_series() {
        let history = two_phase();
        assert_eq!(history.loss(), vec![1.0, 0.7, 0.5, 0.6]);
        assert_eq!(history.fine_tune_start(), Some(2));
        assert_eq!(history.final_accuracy(), Some(0.8));
        assert!(history.val_accuracy().is_empty());
    }

    #[test]
    fn test_final_accuracy_follows_kept_weights() {
        let mut history = two_phase();
        assert_eq!(history.final_accuracy(), Some(0.8));

        // Ran every epoch: the last weights are kept even if an earlier epoch was better
        if let Some(fine) = history.phases.last_mut() {
            fine.stopped_early = false;
        }
        assert_eq!(history.final_accuracy(), Some(0.79));

        assert_eq!(TrainingHistory::default().final_accuracy(), None);
    }

    #[test]
    fn test_save_load_and_curves() {
        let dir = TempDir::new().unwrap();
        let history = two_phase();

        let json = dir.path().join("history.json");
        history.save(&json).unwrap();
        assert_eq!(TrainingHistory::load(&json).unwrap(), history);

        let svg = dir.path().join("curves.svg");
        history.save_curves(&svg).unwrap();
        assert!(std::fs::read_to_string(svg).unwrap().contains("Start Fine Tuning"));
    }
}
