//! PDF report export

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use cotton_disease::report::REPORT_FILENAME;
use tracing::info;

use super::detect::{diagnose, Upload};
use super::ApiError;
use crate::state::SharedState;

/// POST /export/pdf - multipart field `file`, responds with the PDF
pub async fn export_pdf(State(state): State<SharedState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let upload = Upload::from_multipart(&mut multipart, "file").await?;

    let diagnosis = diagnose(state.clone(), upload.bytes)
        .await
        .map_err(|e| match e {
            ApiError::Processing { detail, .. } => ApiError::pdf(detail),
            other => other,
        })?;

    let pdf = tokio::task::spawn_blocking(move || match &state.renderer {
        Some(renderer) => renderer.render_diagnosis(&diagnosis).map_err(ApiError::pdf),
        None => Err(ApiError::pdf(format!("Hindi font not found at {:?}", state.font_path))),
    })
    .await
    .map_err(ApiError::pdf)??;

    info!("Rendered report ({} bytes)", pdf.len());
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILENAME),
            ),
        ],
        pdf,
    )
        .into_response())
}
