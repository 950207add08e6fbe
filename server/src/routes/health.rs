//! Status endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub num_classes: usize,
    pub classes: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub backend: &'static str,
    pub pdf_export: bool,
}

/// GET / - liveness plus the served class list
pub async fn root(State(state): State<SharedState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "API is running",
        num_classes: state.class_names.len(),
        classes: state.class_names.clone(),
    })
}

/// GET /health
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: cotton_disease::backend::backend_name(),
        pdf_export: state.renderer.is_some(),
    })
}
