//! HTTP service that validates applicant attributes, derives the model's
//! feature vector and returns the predicted insurance premium category.

pub mod config;
pub mod error;
pub mod features;
pub mod predict;
pub mod routes;
pub mod schema;

pub use config::Config;
pub use error::ApiError;
pub use predict::{load_classifier, PredictionError, PredictionResult, Predictor};
pub use routes::{cors_layer, router, AppState};
pub use schema::{validate, UserInput, ValidationErrors};
