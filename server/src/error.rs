use crate::schema::ValidationErrors;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body failed validation (422).
    #[error("request validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    /// The classifier could not produce a prediction (500).
    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!({ "detail": errors }),
            ApiError::Prediction(message) => json!({ "detail": message }),
        };
        (status, Json(body)).into_response()
    }
}
