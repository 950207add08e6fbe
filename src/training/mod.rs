//! Training: hyper-parameters, early stopping, metric history, and the
//! two-phase transfer-learning driver.

pub mod config;
pub mod early_stopping;
pub mod history;
pub mod trainer;

pub use config::{ArtifactPaths, TrainingConfig};
pub use early_stopping::{EarlyStopping, EpochVerdict};
pub use history::{EpochRecord, PhaseHistory, TrainingHistory};
pub use trainer::{evaluate, run_training, TrainingSummary};
