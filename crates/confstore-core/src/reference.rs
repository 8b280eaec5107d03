//! Read-only reference data queries over a [`ConfigStore`].
//!
//! Entries are addressed by namespace *name* and key, the way consuming
//! services refer to them. Soft-deleted namespaces and entries are invisible
//! here.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
  entry::ConfigEntry,
  error::{Error, Result},
  secret::{SecretResolver, has_secret_placeholders, resolve_secrets},
  store::ConfigStore,
};

pub const DEFAULT_ID_FIELD: &str = "id";
pub const DEFAULT_SECRET_TIMEOUT: Duration = Duration::from_secs(5);

/// An entry's value as served to reference data consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValue {
  pub namespace:  String,
  pub key:        String,
  pub value:      Value,
  pub version:    u32,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
  pub results: Vec<Value>,
  pub count:   usize,
  pub query:   String,
}

// ─── Reader ──────────────────────────────────────────────────────────────────

pub struct ReferenceReader<S, R> {
  store:          Arc<S>,
  resolver:       Arc<R>,
  secret_timeout: Duration,
}

impl<S, R> Clone for ReferenceReader<S, R> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      resolver:       Arc::clone(&self.resolver),
      secret_timeout: self.secret_timeout,
    }
  }
}

impl<S: ConfigStore, R: SecretResolver> ReferenceReader<S, R> {
  pub fn new(store: Arc<S>, resolver: Arc<R>) -> Self {
    Self { store, resolver, secret_timeout: DEFAULT_SECRET_TIMEOUT }
  }

  /// Bound on each individual secret fetch.
  pub fn with_secret_timeout(mut self, timeout: Duration) -> Self {
    self.secret_timeout = timeout;
    self
  }

  async fn entry(&self, namespace: &str, key: &str) -> Result<ConfigEntry> {
    let not_found = || Error::KeyNotFound {
      namespace: namespace.to_owned(),
      key:       key.to_owned(),
    };
    let ns = self
      .store
      .get_namespace_by_name(namespace)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or_else(|| Error::NamespaceNotFound(namespace.to_owned()))?;
    self
      .store
      .get_config_by_key(ns.id, key)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or_else(not_found)
  }

  /// Fetch an entry's current value, optionally with secret placeholders
  /// replaced. The stored value is never modified.
  pub async fn get_by_key(
    &self,
    namespace: &str,
    key: &str,
    resolve: bool,
  ) -> Result<ReferenceValue> {
    let entry = self.entry(namespace, key).await?;
    let value = if resolve && has_secret_placeholders(&entry.value) {
      debug!(namespace, key, "resolving secret placeholders");
      resolve_secrets(&entry.value, self.resolver.as_ref(), self.secret_timeout).await?
    } else {
      entry.value
    };
    Ok(ReferenceValue {
      namespace: namespace.to_owned(),
      key: entry.key,
      value,
      version: entry.version,
      updated_at: entry.updated_at,
    })
  }

  /// The first element of an array value whose `id_field` equals `id_value`.
  pub async fn lookup_by_id(
    &self,
    namespace: &str,
    key: &str,
    id_value: &str,
    id_field: &str,
  ) -> Result<Value> {
    let entry = self.entry(namespace, key).await?;
    find_item(&entry.value, id_field, id_value)
      .cloned()
      .ok_or_else(|| Error::ItemNotFound {
        namespace: namespace.to_owned(),
        key:       key.to_owned(),
        field:     id_field.to_owned(),
        value:     id_value.to_owned(),
      })
  }

  /// Elements of the value that contain `query`, in their original order.
  pub async fn search(&self, namespace: &str, key: &str, query: &str) -> Result<SearchResults> {
    let entry = self.entry(namespace, key).await?;
    let results = search_items(&entry.value, query);
    Ok(SearchResults { count: results.len(), results, query: query.to_owned() })
  }
}

// ─── Pure helpers ────────────────────────────────────────────────────────────

/// Scan an array of objects for the first element whose `field` matches `id`.
///
/// Strings compare as-is; numbers and booleans compare by their JSON text, so
/// `"42"` finds `{"id": 42}` and `"true"` (not `"True"`) finds `{"id": true}`. Null and missing fields never match. Returns
/// `None` if `value` is not an array.
pub fn find_item<'v>(value: &'v Value, field: &str, id: &str) -> Option<&'v Value> {
  let Value::Array(items) = value else { return None };
  items.iter().find(|item| match item.get(field) {
    Some(Value::String(s)) => s == id,
    Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string() == id,
    _ => false,
  })
}

/// Case-insensitive substring search over string leaves.
///
/// An array yields its matching elements; any other value is treated as a
/// single element. An empty query matches nothing.
pub fn search_items(value: &Value, query: &str) -> Vec<Value> {
  if query.is_empty() {
    return Vec::new();
  }
  let needle = query.to_lowercase();
  match value {
    Value::Array(items) => items
      .iter()
      .filter(|item| contains_text(item, &needle))
      .cloned()
      .collect(),
    other if contains_text(other, &needle) => vec![other.clone()],
    _ => Vec::new(),
  }
}

fn contains_text(value: &Value, needle: &str) -> bool {
  match value {
    Value::String(s) => s.to_lowercase().contains(needle),
    Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
    Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn usecases() -> Value {
    json!([
      { "usecase_id": "UC001", "status": "active", "owner": "Payments Team" },
      { "usecase_id": "UC002", "status": "inactive", "tags": ["legacy", "Billing"] },
      { "usecase_id": 3, "status": "active" }
    ])
  }

  #[test]
  fn find_item_matches_on_the_named_field() {
    let value = usecases();
    assert_eq!(find_item(&value, "usecase_id", "UC002").unwrap()["status"], "inactive");
    assert!(find_item(&value, "usecase_id", "UC999").is_none());
    assert!(find_item(&value, "id", "UC001").is_none());
  }

  #[test]
  fn find_item_compares_scalars_textually() {
    let value = usecases();
    assert_eq!(find_item(&value, "usecase_id", "3").unwrap()["status"], "active");
  }

  #[test]
  fn find_item_matches_booleans_by_json_text() {
    let value = json!([{ "flag": true, "name": "on" }, { "flag": false, "name": "off" }]);
    assert_eq!(find_item(&value, "flag", "true").unwrap()["name"], "on");
    assert_eq!(find_item(&value, "flag", "false").unwrap()["name"], "off");
    assert!(find_item(&value, "flag", "True").is_none());
  }

  #[test]
  fn find_item_requires_an_array() {
    assert!(find_item(&json!({ "id": "a" }), "id", "a").is_none());
  }

  #[test]
  fn search_is_case_insensitive_and_ordered() {
    let value = usecases();
    let hits = search_items(&value, "ACTIVE");
    assert_eq!(hits.len(), 3);

    let hits = search_items(&value, "billing");
    assert_eq!(hits, vec![value[1].clone()]);

    let hits = search_items(&value, "team");
    assert_eq!(hits, vec![value[0].clone()]);
  }

  #[test]
  fn empty_query_or_no_match_is_empty() {
    assert!(search_items(&usecases(), "").is_empty());
    assert!(search_items(&usecases(), "nope").is_empty());
  }

  #[test]
  fn non_array_value_is_one_element() {
    let value = json!({ "region": "eu-west" });
    assert_eq!(search_items(&value, "EU"), vec![value.clone()]);
    assert!(search_items(&value, "us").is_empty());
  }
}
