//! Handlers for `/reference` endpoints: read-only access to config values by
//! namespace name and key, for services that consume them as lookup tables.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reference/{namespace}/{key}` | `?resolve_secrets=true` replaces `vault://` placeholders |
//! | `GET`  | `/reference/{namespace}/{key}/lookup/{id}` | `?id_field=usecase_id` (default `id`) |
//! | `GET`  | `/reference/{namespace}/{key}/search` | `?q=text`, case-insensitive |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use confstore_core::{
  reference::{DEFAULT_ID_FIELD, ReferenceValue, SearchResults},
  secret::SecretResolver,
  store::ConfigStore,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GetParams {
  #[serde(alias = "resolveSecrets", alias = "resolve_vault")]
  pub resolve_secrets: bool,
}

/// `GET /reference/{namespace}/{key}`
pub async fn get_by_key<S, R>(
  State(state): State<AppState<S, R>>,
  Path((namespace, key)): Path<(String, String)>,
  Query(params): Query<GetParams>,
) -> Result<Json<ReferenceValue>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let value = state
    .reader
    .get_by_key(&namespace, &key, params.resolve_secrets)
    .await?;
  Ok(Json(value))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
  #[serde(default = "default_id_field", alias = "idField")]
  pub id_field: String,
}

fn default_id_field() -> String { DEFAULT_ID_FIELD.to_owned() }

/// `GET /reference/{namespace}/{key}/lookup/{id}`
pub async fn lookup<S, R>(
  State(state): State<AppState<S, R>>,
  Path((namespace, key, id)): Path<(String, String, String)>,
  Query(params): Query<LookupParams>,
) -> Result<Json<Value>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let item = state
    .reader
    .lookup_by_id(&namespace, &key, &id, &params.id_field)
    .await?;
  Ok(Json(item))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
  pub q: String,
}

/// `GET /reference/{namespace}/{key}/search?q=text`
pub async fn search<S, R>(
  State(state): State<AppState<S, R>>,
  Path((namespace, key)): Path<(String, String)>,
  Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError>
where
  S: ConfigStore,
  R: SecretResolver,
{
  let results = state.reader.search(&namespace, &key, &params.q).await?;
  Ok(Json(results))
}
