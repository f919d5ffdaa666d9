use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{messaging::MessengerError, picture::ImageError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Not paired or session expired")]
    NotAuthorized,

    #[error("Image processing failed: {0}")]
    Processing(#[from] ImageError),

    #[error("Profile picture update failed: {0}")]
    UpdateFailed(#[from] MessengerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(message) => (StatusCode::BAD_REQUEST, *message),
            AppError::NotAuthorized => (StatusCode::FORBIDDEN, "Not paired or session expired"),
            AppError::Processing(_) | AppError::UpdateFailed(_) => {
                error!("DP update error: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update DP")
            }
            AppError::Internal(_) => {
                error!("{self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
