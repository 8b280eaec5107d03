//! JSON REST API for confstore.
//!
//! Exposes an axum [`Router`] backed by any [`ConfigStore`] and
//! [`SecretResolver`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", confstore_api::api_router(AppState::new(store, resolver)))
//! ```

pub mod configs;
pub mod error;
pub mod namespaces;
pub mod reference;
pub mod schemas;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use confstore_core::{reference::ReferenceReader, secret::SecretResolver, store::ConfigStore};

pub use error::ApiError;

/// Shared handler state: the store plus a reference reader over it.
pub struct AppState<S, R> {
  pub store:  Arc<S>,
  pub reader: ReferenceReader<S, R>,
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), reader: self.reader.clone() }
  }
}

impl<S: ConfigStore, R: SecretResolver> AppState<S, R> {
  pub fn new(store: Arc<S>, resolver: Arc<R>) -> Self {
    let reader = ReferenceReader::new(Arc::clone(&store), resolver);
    Self { store, reader }
  }

  pub fn with_secret_timeout(mut self, timeout: Duration) -> Self {
    self.reader = self.reader.with_secret_timeout(timeout);
    self
  }
}

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, R>(state: AppState<S, R>) -> Router<()>
where
  S: ConfigStore + 'static,
  R: SecretResolver + 'static,
{
  Router::new()
    // Namespaces
    .route("/namespaces", get(namespaces::list::<S, R>).post(namespaces::create::<S, R>))
    .route(
      "/namespaces/{id}",
      get(namespaces::get_one::<S, R>).delete(namespaces::delete_one::<S, R>),
    )
    // Schemas
    .route("/schemas", get(schemas::list::<S, R>).post(schemas::create::<S, R>))
    .route("/schemas/validate", post(schemas::validate_data))
    .route("/schemas/versions/{name}", get(schemas::versions::<S, R>))
    .route(
      "/schemas/{id}",
      get(schemas::get_one::<S, R>)
        .put(schemas::revise::<S, R>)
        .delete(schemas::delete_one::<S, R>),
    )
    // Configs
    .route("/configs", get(configs::list::<S, R>).post(configs::create::<S, R>))
    .route(
      "/configs/{id}",
      get(configs::get_one::<S, R>)
        .put(configs::update::<S, R>)
        .delete(configs::delete_one::<S, R>),
    )
    .route("/configs/{id}/history", get(configs::history::<S, R>))
    .route("/configs/{id}/history/{version}", get(configs::history_version::<S, R>))
    // Reference data
    .route("/reference/{namespace}/{key}", get(reference::get_by_key::<S, R>))
    .route("/reference/{namespace}/{key}/lookup/{id}", get(reference::lookup::<S, R>))
    .route("/reference/{namespace}/{key}/search", get(reference::search::<S, R>))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
  };
  use confstore_core::secret::StaticSecretResolver;
  use confstore_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt;

  use super::*;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let resolver = StaticSecretResolver::new().with("db-password", "hunter2");
    api_router(AppState::new(Arc::new(store), Arc::new(resolver)))
  }

  async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(body) => builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
  }

  fn usecase_schema() -> Value {
    json!({
      "type": "array",
      "items": {
        "type": "object",
        "required": ["usecase_id", "status"],
        "properties": {
          "usecase_id": { "type": "string" },
          "status": { "type": "string", "enum": ["active", "inactive"] },
          "owner": { "type": "string" }
        }
      }
    })
  }

  /// Creates namespace `payments`, schema `usecases` and returns their ids.
  async fn seed(app: &Router) -> (String, String) {
    let (status, ns) = send(app, Method::POST, "/namespaces", Some(json!({ "name": "payments" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, schema) = send(
      app,
      Method::POST,
      "/schemas",
      Some(json!({ "name": "usecases", "structure": usecase_schema() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schema["version"], 1);
    (ns["id"].as_str().unwrap().to_owned(), schema["id"].as_str().unwrap().to_owned())
  }

  async fn create_config(app: &Router, ns: &str, schema: &str, key: &str, value: Value) -> (StatusCode, Value) {
    send(
      app,
      Method::POST,
      "/configs",
      Some(json!({ "namespace_id": ns, "schema_id": schema, "key": key, "value": value })),
    )
    .await
  }

  #[tokio::test]
  async fn config_lifecycle_over_http() {
    let app = app().await;
    let (ns, schema) = seed(&app).await;

    let (status, entry) = create_config(
      &app,
      &ns,
      &schema,
      "usecases",
      json!([{ "usecase_id": "UC001", "status": "active" }]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["version"], 1);
    let id = entry["id"].as_str().unwrap().to_owned();

    let (status, entry) = send(
      &app,
      Method::PUT,
      &format!("/configs/{id}"),
      Some(json!({ "value": [{ "usecase_id": "UC001", "status": "inactive" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["version"], 2);

    let (status, history) = send(&app, Method::GET, &format!("/configs/{id}/history"), None).await;
    assert_eq!(status, StatusCode::OK);
    let versions: Vec<_> = history.as_array().unwrap().iter().map(|r| r["version"].clone()).collect();
    assert_eq!(versions, vec![json!(1), json!(2)]);

    let (status, v1) = send(&app, Method::GET, &format!("/configs/{id}/history/1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v1["value"][0]["status"], "active");

    let (status, _) = send(&app, Method::GET, &format!("/configs/{id}/history/9"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, &format!("/configs?namespace_id={ns}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/configs/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &format!("/configs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &format!("/configs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, deleted) =
      send(&app, Method::GET, &format!("/configs/{id}?include_deleted=true"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!deleted["deleted_at"].is_null());

    // The key is free again once the old entry is deleted.
    let (status, _) = create_config(&app, &ns, &schema, "usecases", json!([])).await;
    assert_eq!(status, StatusCode::CREATED);
  }

  #[tokio::test]
  async fn invalid_value_is_a_400_with_paths() {
    let app = app().await;
    let (ns, schema) = seed(&app).await;

    let (status, body) = create_config(
      &app,
      &ns,
      &schema,
      "usecases",
      json!([{ "usecase_id": "UC001", "status": "deleted" }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["errors"][0]["path"], "[0].status");

    let (_, list) = send(&app, Method::GET, "/configs", None).await;
    assert!(list.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn duplicate_key_is_a_conflict() {
    let app = app().await;
    let (ns, schema) = seed(&app).await;
    let (status, _) = create_config(&app, &ns, &schema, "usecases", json!([])).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = create_config(&app, &ns, &schema, "usecases", json!([])).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_key");

    let (status, body) = send(&app, Method::POST, "/namespaces", Some(json!({ "name": "payments" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_namespace");
  }

  #[tokio::test]
  async fn stale_expected_version_is_a_conflict() {
    let app = app().await;
    let (ns, schema) = seed(&app).await;
    let (_, entry) = create_config(&app, &ns, &schema, "usecases", json!([])).await;
    let id = entry["id"].as_str().unwrap();

    let (status, _) = send(
      &app,
      Method::PUT,
      &format!("/configs/{id}"),
      Some(json!({ "value": [], "expected_version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
      &app,
      Method::PUT,
      &format!("/configs/{id}"),
      Some(json!({ "value": [], "expected_version": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "version_conflict");
  }

  #[tokio::test]
  async fn schema_revisions_and_invalid_documents() {
    let app = app().await;
    let (_, schema) = seed(&app).await;

    let (status, body) = send(
      &app,
      Method::POST,
      "/schemas",
      Some(json!({ "name": "broken", "structure": { "type": "banana" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_schema");

    let (status, v2) = send(
      &app,
      Method::PUT,
      &format!("/schemas/{schema}"),
      Some(json!({ "structure": { "type": "array" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v2["version"], 2);
    assert_ne!(v2["id"], json!(schema));

    let (status, versions) = send(&app, Method::GET, "/schemas/versions/usecases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(versions.as_array().unwrap().len(), 2);

    let (status, v1) = send(&app, Method::GET, &format!("/schemas/{schema}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v1["structure"], usecase_schema());
  }

  #[tokio::test]
  async fn reference_endpoints() {
    let app = app().await;
    let (ns, schema) = seed(&app).await;
    create_config(
      &app,
      &ns,
      &schema,
      "usecases",
      json!([
        { "usecase_id": "UC001", "status": "active", "owner": "Payments Team" },
        { "usecase_id": "UC002", "status": "inactive" }
      ]),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/reference/payments/usecases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["namespace"], "payments");
    assert_eq!(body["version"], 1);

    let (status, item) = send(
      &app,
      Method::GET,
      "/reference/payments/usecases/lookup/UC002?id_field=usecase_id",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["status"], "inactive");

    let (status, _) = send(
      &app,
      Method::GET,
      "/reference/payments/usecases/lookup/UC999?idField=usecase_id",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, hits) = send(&app, Method::GET, "/reference/payments/usecases/search?q=TEAM", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits["count"], 1);
    assert_eq!(hits["results"][0]["usecase_id"], "UC001");

    let (status, body) = send(&app, Method::GET, "/reference/nowhere/usecases", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
  }

  #[tokio::test]
  async fn secrets_resolve_on_request_and_fail_closed() {
    let app = app().await;
    let (status, ns) = send(&app, Method::POST, "/namespaces", Some(json!({ "name": "infra" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, schema) = send(
      &app,
      Method::POST,
      "/schemas",
      Some(json!({ "name": "db", "structure": { "type": "object" } })),
    )
    .await;
    let (ns, schema) = (ns["id"].as_str().unwrap(), schema["id"].as_str().unwrap());
    create_config(&app, ns, schema, "primary", json!({ "password": "vault://db-password" })).await;
    create_config(&app, ns, schema, "replica", json!({ "password": "vault://missing" })).await;

    let (_, raw) = send(&app, Method::GET, "/reference/infra/primary", None).await;
    assert_eq!(raw["value"]["password"], "vault://db-password");

    let (status, resolved) =
      send(&app, Method::GET, "/reference/infra/primary?resolve_secrets=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["value"]["password"], "hunter2");

    let (status, body) =
      send(&app, Method::GET, "/reference/infra/replica?resolveSecrets=true", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "secret_resolution_error");
    assert!(!body.to_string().contains("hunter2"));
  }

  #[tokio::test]
  async fn validate_endpoint_reports_without_storing() {
    let app = app().await;
    let (status, body) = send(
      &app,
      Method::POST,
      "/schemas/validate",
      Some(json!({
        "schema_structure": { "type": "object", "required": ["name"] },
        "data": {}
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"][0]["path"], "name");

    let (_, body) = send(
      &app,
      Method::POST,
      "/schemas/validate",
      Some(json!({ "schema_structure": { "type": "object" }, "data": {} })),
    )
    .await;
    assert_eq!(body["valid"], true);

    let (_, schemas) = send(&app, Method::GET, "/schemas", None).await;
    assert!(schemas.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn deleted_namespace_is_gone_but_fetchable_by_id() {
    let app = app().await;
    let (ns, _) = seed(&app).await;
    let (status, _) = send(&app, Method::DELETE, &format!("/namespaces/{ns}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &format!("/namespaces/{ns}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/namespaces", None).await;
    assert!(list.as_array().unwrap().is_empty());
    let (status, body) = send(&app, Method::GET, &format!("/namespaces/{ns}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["deleted_at"].is_null());
  }
}
