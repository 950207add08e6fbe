//! HTTP routes and the shared error body

pub mod detect;
pub mod health;
pub mod report;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub const INVALID_IMAGE_TYPE: &str = "Invalid image type. JPG या PNG छवि अपलोड करें।";
pub const IMAGE_PROCESSING_FAILED: &str = "छवि को संसाधित करने में समस्या आई।";
pub const PDF_FAILED: &str = "PDF बनाने में समस्या आई।";

/// Upload content types accepted by every image endpoint
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/detect", post(detect::detect))
        .route("/predict", post(detect::predict))
        .route("/export/pdf", post(report::export_pdf))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_message: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    InvalidImageType,
    /// The expected multipart field is absent
    MissingField(&'static str),
    /// Malformed multipart body
    BadRequest(String),
    Processing { error: &'static str, detail: String },
}

impl ApiError {
    pub fn image(detail: impl ToString) -> Self {
        ApiError::Processing {
            error: IMAGE_PROCESSING_FAILED,
            detail: detail.to_string(),
        }
    }

    pub fn pdf(detail: impl ToString) -> Self {
        ApiError::Processing {
            error: PDF_FAILED,
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidImageType => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: INVALID_IMAGE_TYPE.to_string(),
                    debug_message: None,
                },
            ),
            ApiError::MissingField(name) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: format!("missing multipart field '{}'", name),
                    debug_message: None,
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    debug_message: None,
                },
            ),
            ApiError::Processing { error, detail } => {
                tracing::error!("{}: {}", error, detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: error.to_string(),
                        debug_message: Some(detail),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
