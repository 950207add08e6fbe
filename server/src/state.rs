//! Shared state for the cotton disease API
//!
//! Holds the loaded predictor (behind a mutex, inference runs on the
//! blocking pool) and the optional report renderer.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cotton_disease::backend::{default_device, DefaultBackend};
use cotton_disease::inference::Predictor;
use cotton_disease::report::{ReportRenderer, DEFAULT_FONT_PATH};
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory with model.mpk, class_names.json and training_config.json
    pub artifacts_dir: PathBuf,
    /// Devanagari font used for PDF reports
    pub font_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
        }
    }
}

pub struct AppState {
    pub predictor: Mutex<Predictor<DefaultBackend>>,
    pub class_names: Vec<String>,
    /// `None` when the font could not be loaded; reports then fail with 500
    pub renderer: Option<ReportRenderer>,
    pub font_path: PathBuf,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Load the trained model and the report font
    pub fn load(config: &ServerConfig) -> anyhow::Result<Self> {
        let predictor = Predictor::<DefaultBackend>::load(&config.artifacts_dir, &default_device())?;

        let renderer = match ReportRenderer::from_font_file(&config.font_path) {
            Ok(renderer) => Some(renderer),
            Err(e) => {
                warn!("PDF export disabled: {}", e);
                None
            }
        };

        Ok(Self::new(predictor, renderer, config.font_path.clone()))
    }

    pub fn new(predictor: Predictor<DefaultBackend>, renderer: Option<ReportRenderer>, font_path: PathBuf) -> Self {
        let class_names = predictor.class_names().to_vec();
        info!("Serving {} classes: {:?}", class_names.len(), class_names);
        Self {
            predictor: Mutex::new(predictor),
            class_names,
            renderer,
            font_path,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
