//! Diagnosis endpoints

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use cotton_disease::inference::Diagnosis;
use cotton_disease::CottonError;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ALLOWED_CONTENT_TYPES};
use crate::state::SharedState;

/// An uploaded image taken from a multipart form
#[derive(Debug)]
pub struct Upload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
}

impl Upload {
    /// Find `field` in the form and reject non JPEG/PNG content types
    pub async fn from_multipart(multipart: &mut Multipart, field: &'static str) -> Result<Self, ApiError> {
        while let Some(part) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            if part.name() != Some(field) {
                continue;
            }

            if !part
                .content_type()
                .is_some_and(|ct| ALLOWED_CONTENT_TYPES.contains(&ct))
            {
                return Err(ApiError::InvalidImageType);
            }

            let file_name = part.file_name().map(str::to_string);
            let bytes = part.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(Self { bytes, file_name });
        }
        Err(ApiError::MissingField(field))
    }
}

/// Run the predictor on the blocking pool
pub async fn diagnose(state: SharedState, bytes: Bytes) -> Result<Diagnosis, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("diagnose", %request_id);

    tokio::task::spawn_blocking(move || {
        let _entered = span.entered();
        let predictor = state
            .predictor
            .lock()
            .map_err(|_| CottonError::Inference("predictor lock poisoned".to_string()))?;
        predictor.predict_bytes(&bytes).map(|p| Diagnosis::from_prediction(&p))
    })
    .await
    .map_err(ApiError::image)?
    .map_err(ApiError::image)
}

async fn detect_field(state: SharedState, mut multipart: Multipart, field: &'static str) -> Result<Json<Diagnosis>, ApiError> {
    let upload = Upload::from_multipart(&mut multipart, field).await?;
    let diagnosis = diagnose(state, upload.bytes).await?;
    info!(
        "{} → {} ({:.2}%){}",
        upload.file_name.as_deref().unwrap_or("upload"),
        diagnosis.disease,
        diagnosis.confidence,
        if diagnosis.is_low_confidence() { " low confidence" } else { "" }
    );
    Ok(Json(diagnosis))
}

/// POST /detect - multipart field `image`
pub async fn detect(State(state): State<SharedState>, multipart: Multipart) -> Result<Json<Diagnosis>, ApiError> {
    detect_field(state, multipart, "image").await
}

/// POST /predict - legacy alias taking the field `file`
pub async fn predict(State(state): State<SharedState>, multipart: Multipart) -> Result<Json<Diagnosis>, ApiError> {
    detect_field(state, multipart, "file").await
}
