//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape
//! `{"error": "<kind>", "message": "<text>"}`; validation failures add an
//! `errors` array of `{path, message}` violations.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use confstore_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Domain(#[from] CoreError),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  /// Convert a store error into its domain classification.
  pub fn store(err: impl Into<CoreError>) -> Self { Self::Domain(err.into()) }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Domain(e) if e.is_not_found() => StatusCode::NOT_FOUND,
      ApiError::Domain(e) => match e {
        CoreError::Validation(_) | CoreError::InvalidSchema(_) => StatusCode::BAD_REQUEST,
        CoreError::DuplicateKey { .. }
        | CoreError::DuplicateNamespace(_)
        | CoreError::DuplicateSchemaName(_)
        | CoreError::VersionConflict { .. } => StatusCode::CONFLICT,
        CoreError::SecretResolution { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  /// Machine-readable error kind.
  pub fn kind(&self) -> &'static str {
    match self {
      ApiError::BadRequest(_) => "bad_request",
      ApiError::Domain(e) if e.is_not_found() => "not_found",
      ApiError::Domain(e) => match e {
        CoreError::Validation(_) => "validation_error",
        CoreError::InvalidSchema(_) => "invalid_schema",
        CoreError::DuplicateKey { .. } => "duplicate_key",
        CoreError::DuplicateNamespace(_) => "duplicate_namespace",
        CoreError::DuplicateSchemaName(_) => "duplicate_schema_name",
        CoreError::VersionConflict { .. } => "version_conflict",
        CoreError::SecretResolution { .. } => "secret_resolution_error",
        _ => "internal_error",
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      match status {
        StatusCode::BAD_GATEWAY => warn!(error = %self, "upstream failure"),
        _ => error!(error = %self, "request failed"),
      }
    }

    let mut body = json!({ "error": self.kind(), "message": self.to_string() });
    if let ApiError::Domain(CoreError::Validation(errors)) = &self {
      body["errors"] = json!(errors);
    }
    (status, Json(body)).into_response()
  }
}
