//! Async HTTP client wrapping the confstore JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use confstore_core::{
  entry::{ConfigEntry, ConfigUpdate},
  namespace::Namespace,
  schema::SchemaDefinition,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Connection settings for the confstore API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Async HTTP client for the confstore JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  message: String,
  #[serde(default)]
  errors:  Vec<Violation>,
}

#[derive(Debug, Deserialize)]
struct Violation {
  path:    String,
  message: String,
}

impl ErrorBody {
  fn describe(&self) -> String {
    if self.errors.is_empty() {
      return self.message.clone();
    }
    let parts: Vec<String> = self
      .errors
      .iter()
      .map(|v| if v.path.is_empty() { v.message.clone() } else { format!("{}: {}", v.path, v.message) })
      .collect();
    parts.join("; ")
  }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let detail = match resp.json::<ErrorBody>().await {
    Ok(body) => body.describe(),
    Err(_) => String::from("no details"),
  };
  Err(anyhow!("{what} → {status}: {detail}"))
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  // ── Namespaces ────────────────────────────────────────────────────────────

  /// `GET /namespaces`
  pub async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
    let resp = self
      .client
      .get(self.url("/namespaces"))
      .send()
      .await
      .context("GET /namespaces failed")?;
    check(resp, "GET /namespaces").await?.json().await.context("deserialising namespaces")
  }

  // ── Schemas ───────────────────────────────────────────────────────────────

  /// `GET /schemas/{id}`
  pub async fn get_schema(&self, id: Uuid) -> Result<SchemaDefinition> {
    let resp = self
      .client
      .get(self.url(&format!("/schemas/{id}")))
      .send()
      .await
      .context("GET /schemas/{id} failed")?;
    check(resp, "GET /schemas/{id}").await?.json().await.context("deserialising schema")
  }

  // ── Configs ───────────────────────────────────────────────────────────────

  /// `GET /configs?limit=<n>`
  pub async fn list_configs(&self, limit: u32) -> Result<Vec<ConfigEntry>> {
    let resp = self
      .client
      .get(self.url("/configs"))
      .query(&[("limit", limit.to_string())])
      .send()
      .await
      .context("GET /configs failed")?;
    check(resp, "GET /configs").await?.json().await.context("deserialising configs")
  }

  /// `PUT /configs/{id}` guarded by the version the edit started from.
  pub async fn update_config(
    &self,
    id: Uuid,
    value: Value,
    expected_version: u32,
  ) -> Result<ConfigEntry> {
    let body = ConfigUpdate::new(value).expecting(expected_version);
    let resp = self
      .client
      .put(self.url(&format!("/configs/{id}")))
      .json(&body)
      .send()
      .await
      .context("PUT /configs/{id} failed")?;
    check(resp, "PUT /configs/{id}").await?.json().await.context("deserialising config")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_errors_are_listed_with_paths() {
    let body: ErrorBody = serde_json::from_value(serde_json::json!({
      "error": "validation_error",
      "message": "value does not match schema",
      "errors": [
        { "path": "[0].status", "message": "\"deleted\" is not one of [\"active\", \"inactive\"]" },
        { "path": "", "message": "expected array" }
      ]
    }))
    .unwrap();
    assert_eq!(
      body.describe(),
      "[0].status: \"deleted\" is not one of [\"active\", \"inactive\"]; expected array"
    );
  }

  #[test]
  fn plain_errors_use_the_message() {
    let body: ErrorBody = serde_json::from_value(serde_json::json!({
      "error": "version_conflict",
      "message": "config was modified concurrently"
    }))
    .unwrap();
    assert_eq!(body.describe(), "config was modified concurrently");
  }
}
