//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use reef_core::{job::JobError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store error by the domain rule it reports, if any.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    use reef_core::Error as Domain;

    match e.domain() {
      Some(Domain::ProfileNotFound(uid)) => {
        ApiError::NotFound(format!("profile {uid} not found"))
      }
      Some(
        Domain::NotEnrolled(_)
        | Domain::AlreadyGranted { .. }
        | Domain::InsufficientPoints { .. }
        | Domain::ExpirationExists { .. },
      ) => ApiError::Conflict(e.to_string()),
      Some(Domain::MalformedDocument(_)) => ApiError::BadRequest(e.to_string()),
      _ => ApiError::Store(Box::new(e)),
    }
  }

  pub fn from_job<E: StoreError>(e: JobError<E>) -> Self {
    tracing::warn!(error = %e, "yearly check request failed");
    ApiError::Store(Box::new(e))
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
