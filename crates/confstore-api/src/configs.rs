//! Handlers for `/configs` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/configs` | `?namespace_id&schema_id&include_deleted&offset&limit` |
//! | `POST`   | `/configs` | Body: `{"namespace_id","schema_id","key","value"}`; 201 |
//! | `GET`    | `/configs/{id}` | Optional `?include_deleted=true` |
//! | `PUT`    | `/configs/{id}` | Body: `{"value","expected_version"?}` |
//! | `DELETE` | `/configs/{id}` | Soft delete; 204, or 404 if already deleted |
//! | `GET`    | `/configs/{id}/history` | Every version, oldest first |
//! | `GET`    | `/configs/{id}/history/{version}` | One historical value |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use confstore_core::{
  Error as CoreError,
  entry::{ConfigEntry, ConfigUpdate, HistoryRecord, NewConfigEntry},
  secret::SecretResolver,
  store::{ConfigQuery, ConfigStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List / get ───────────────────────────────────────────────────────────────

/// `GET /configs`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  Query(query): Query<ConfigQuery>,
) -> Result<Json<Vec<ConfigEntry>>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let entries = state.store.list_configs(&query).await.map_err(ApiError::store)?;
  Ok(Json(entries))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GetParams {
  pub include_deleted: bool,
}

/// `GET /configs/{id}[?include_deleted=true]`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Query(params): Query<GetParams>,
) -> Result<Json<ConfigEntry>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let entry = state
    .store
    .get_config(id, params.include_deleted)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::ConfigNotFound(id))?;
  Ok(Json(entry))
}

// ─── Writes ───────────────────────────────────────────────────────────────────

/// `POST /configs`
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<NewConfigEntry>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  if body.key.is_empty() {
    return Err(ApiError::BadRequest("config key must not be empty".into()));
  }
  let entry = state.store.create_config(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(entry)))
}

/// `PUT /configs/{id}`
pub async fn update<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ConfigUpdate>,
) -> Result<Json<ConfigEntry>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let entry = state.store.update_config(id, body).await.map_err(ApiError::store)?;
  Ok(Json(entry))
}

/// `DELETE /configs/{id}`
pub async fn delete_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  state.store.delete_config(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /configs/{id}/history`
pub async fn history<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let records = state.store.history(id).await.map_err(ApiError::store)?;
  Ok(Json(records))
}

/// `GET /configs/{id}/history/{version}`
pub async fn history_version<S, R>(
  State(state): State<AppState<S, R>>,
  Path((id, version)): Path<(Uuid, u32)>,
) -> Result<Json<HistoryRecord>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let record = state
    .store
    .history_version(id, version)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::VersionNotFound { config_id: id, version })?;
  Ok(Json(record))
}
