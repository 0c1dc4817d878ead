use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("request too large")]
    RequestTooLarge,
    #[error("{0}")]
    Misconfigured(String),
    #[error("{0}")]
    UpstreamFailed(String),
    #[error("{0}")]
    UpstreamNoOutput(String),
    #[error("face swap timed out after {0}s")]
    ExecTimeout(u64),
    #[error("image error: {0}")]
    Image(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub detail: String,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::Misconfigured(_) => "Misconfigured",
            AppError::UpstreamFailed(_) => "UpstreamFailed",
            AppError::UpstreamNoOutput(_) => "UpstreamNoOutput",
            AppError::ExecTimeout(_) => "ExecTimeout",
            AppError::Image(_) => "Image",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UpstreamFailed(_) | AppError::UpstreamNoOutput(_) => StatusCode::BAD_GATEWAY,
            AppError::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Misconfigured(_) | AppError::ExecTimeout(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => AppError::Internal(io.to_string()),
            other => AppError::Image(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody { code: self.code(), detail: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
