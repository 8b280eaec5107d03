//! Handlers for `/namespaces` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/namespaces` | Optional `?include_deleted=true` |
//! | `POST`   | `/namespaces` | Body: `{"name":"payments","description":"..."}`; 409 on a taken name |
//! | `GET`    | `/namespaces/{id}` | Resolves deleted namespaces too |
//! | `DELETE` | `/namespaces/{id}` | Soft delete; 404 if already deleted |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use confstore_core::{
  Error as CoreError,
  namespace::{Namespace, NewNamespace},
  secret::SecretResolver,
  store::ConfigStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
  pub include_deleted: bool,
}

/// `GET /namespaces[?include_deleted=true]`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Namespace>>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let namespaces = state
    .store
    .list_namespaces(params.include_deleted)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(namespaces))
}

/// `POST /namespaces`
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<NewNamespace>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("namespace name must not be empty".into()));
  }
  let namespace = state.store.create_namespace(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(namespace)))
}

/// `GET /namespaces/{id}`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Namespace>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let namespace = state
    .store
    .get_namespace(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| CoreError::NamespaceNotFound(id.to_string()))?;
  Ok(Json(namespace))
}

/// `DELETE /namespaces/{id}`
pub async fn delete_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  state.store.delete_namespace(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
