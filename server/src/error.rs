use annotation::AnnotationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use segmentation::SegmentationError;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to the client as `{"error": <message>}` JSON with a
/// status mirroring the failure: 400 for bad input, 409 before any upload,
/// 500 for backend or encoding failures.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid file type. Please upload an image.")]
    InvalidContentType,

    #[error("No file uploaded")]
    MissingFile,

    #[error("Could not decode image: {0}")]
    InvalidImage(String),

    #[error("Invalid point label {0}, expected 0 (background) or 1 (foreground)")]
    InvalidLabel(u8),

    #[error("{0}")]
    BadRequest(String),

    #[error("No image uploaded yet")]
    NotReady,

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Worker task failed")]
    Worker(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidContentType
            | Self::MissingFile
            | Self::InvalidImage(_)
            | Self::InvalidLabel(_)
            | Self::BadRequest(_)
            | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::NotReady => StatusCode::CONFLICT,
            Self::Inference(_) | Self::Encode(_) | Self::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<AnnotationError> for ApiError {
    fn from(err: AnnotationError) -> Self {
        match err {
            AnnotationError::NotReady => Self::NotReady,
            AnnotationError::PointOutOfBounds { .. } => Self::BadRequest(err.to_string()),
            other => Self::Inference(other.to_string()),
        }
    }
}

impl From<SegmentationError> for ApiError {
    fn from(err: SegmentationError) -> Self {
        match err {
            SegmentationError::InvalidLabel(label) => Self::InvalidLabel(label),
            SegmentationError::InvalidPrompt(message) => Self::BadRequest(message),
            other => Self::Inference(other.to_string()),
        }
    }
}
