//! Handlers for `/schemas` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/schemas` | Optional `?include_deleted=true`; by name, newest version first |
//! | `POST`   | `/schemas` | Body: `{"name", "structure", "description"?}`; creates version 1 |
//! | `POST`   | `/schemas/validate` | Body: `{"schema_structure", "data"}`; stores nothing |
//! | `GET`    | `/schemas/versions/{name}` | Every version of one name |
//! | `GET`    | `/schemas/{id}` | Resolves deleted versions too |
//! | `PUT`    | `/schemas/{id}` | Body: `{"structure", "description"?}`; publishes the next version |
//! | `DELETE` | `/schemas/{id}` | Soft delete |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use confstore_core::{
  Error as CoreError,
  schema::{NewSchema, SchemaDefinition, SchemaRevision},
  secret::SecretResolver,
  store::ConfigStore,
  validate::{ValidationResult, Violation, validate},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
  pub include_deleted: bool,
}

/// `GET /schemas[?include_deleted=true]`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SchemaDefinition>>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let schemas = state
    .store
    .list_schemas(params.include_deleted)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(schemas))
}

/// `GET /schemas/versions/{name}`
pub async fn versions<S, R>(
  State(state): State<AppState<S, R>>,
  Path(name): Path<String>,
) -> Result<Json<Vec<SchemaDefinition>>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let versions = state
    .store
    .list_schema_versions(&name)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(versions))
}

// ─── Create / revise ──────────────────────────────────────────────────────────

/// `POST /schemas`
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<NewSchema>,
) -> Result<Json<SchemaDefinition>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("schema name must not be empty".into()));
  }
  let schema = state.store.create_schema(body).await.map_err(ApiError::store)?;
  Ok(Json(schema))
}

/// `PUT /schemas/{id}`: publish a new version based on `id`.
pub async fn revise<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SchemaRevision>,
) -> Result<Json<SchemaDefinition>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let schema = state.store.revise_schema(id, body).await.map_err(ApiError::store)?;
  Ok(Json(schema))
}

// ─── Get / delete ─────────────────────────────────────────────────────────────

/// `GET /schemas/{id}`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SchemaDefinition>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let schema = state
    .store
    .get_schema(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::SchemaNotFound(id))?;
  Ok(Json(schema))
}

/// `DELETE /schemas/{id}`
pub async fn delete_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  state.store.delete_schema(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Ad-hoc validation ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
  pub schema_structure: Value,
  pub data:             Value,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
  pub valid:  bool,
  pub errors: Vec<Violation>,
}

/// `POST /schemas/validate`
pub async fn validate_data(
  Json(body): Json<ValidateBody>,
) -> Result<Json<ValidateResponse>, ApiError> {
  let result = validate(&body.data, &body.schema_structure).map_err(CoreError::from)?;
  let response = match result {
    ValidationResult::Accepted => ValidateResponse { valid: true, errors: Vec::new() },
    ValidationResult::Rejected(errors) => {
      debug!(violations = errors.len(), "ad-hoc validation rejected");
      ValidateResponse { valid: false, errors: errors.0 }
    }
  };
  Ok(Json(response))
}
