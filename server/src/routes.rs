use crate::error::ApiError;
use crate::predict::{PredictionResult, Predictor};
use crate::schema;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::time::Instant;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Reported by `/health` when the artifact carries no version of its own.
pub const MODEL_VERSION: &str = "1.0.0";
pub const SERVICE_NAME: &str = "Insurence Prediction Model API ";
const ROOT_MESSAGE: &str = "This is the end Point where model Testing API is hosted";
const REDACTED_DETAIL: &str = "prediction failed";

#[derive(Clone)]
pub struct AppState {
    predictor: Predictor,
    started: Instant,
    redact_errors: bool,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor,
            started: Instant::now(),
            redact_errors: false,
        }
    }

    pub fn with_redacted_errors(mut self, redact: bool) -> Self {
        self.redact_errors = redact;
        self
    }
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    model_loaded: bool,
    service: &'static str,
    uptime_seconds: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .with_state(state)
}

/// CORS for the browser frontend. A `*` entry allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };

    // Credentials rule out wildcard methods/headers, so mirror the preflight instead
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: ROOT_MESSAGE,
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.started.elapsed().as_secs_f64();
    Json(HealthResponse {
        status: "OK",
        version: state
            .predictor
            .version()
            .unwrap_or(MODEL_VERSION)
            .to_string(),
        model_loaded: !state.predictor.classes().is_empty(),
        service: SERVICE_NAME,
        uptime_seconds: (uptime * 100.0).round() / 100.0,
    })
}

async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResult>, ApiError> {
    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(schema::ValidationErrors::json_invalid(&e, &body)))?;

    let input = match schema::validate(&raw) {
        Ok(input) => input,
        Err(errors) => {
            tracing::warn!(fields = ?errors.fields(), "rejected prediction request");
            return Err(ApiError::Validation(errors));
        }
    };

    match state.predictor.predict(&input) {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!(error = %e, "prediction failed");
            let detail = if state.redact_errors {
                REDACTED_DETAIL.to_string()
            } else {
                e.to_string()
            };
            Err(ApiError::Prediction(detail))
        }
    }
}
