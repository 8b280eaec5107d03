//! Secret placeholders and the resolver abstraction.
//!
//! A string leaf whose whole content is `vault://<name>` is a placeholder for
//! the secret `<name>`. Placeholders are only ever replaced in values handed
//! to readers; stored values keep the placeholder.

use std::{collections::HashMap, future::Future, time::Duration};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::error::{Error, Result};

pub const PLACEHOLDER_PREFIX: &str = "vault://";

#[derive(Debug, Error)]
pub enum SecretError {
  #[error("secret {0:?} does not exist")]
  Missing(String),

  #[error("{0:?} is not a valid secret name")]
  InvalidName(String),

  #[error("secret resolution is not configured")]
  Disabled,

  #[error("timed out after {0:?}")]
  TimedOut(Duration),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Source of secret values, e.g. a vault, the environment or a directory.
pub trait SecretResolver: Send + Sync {
  fn resolve<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<String, SecretError>> + Send + 'a;
}

/// The secret name `s` refers to, if `s` is exactly a placeholder.
pub fn placeholder_name(s: &str) -> Option<&str> {
  s.strip_prefix(PLACEHOLDER_PREFIX).filter(|name| !name.is_empty())
}

/// Whether any string leaf of `value` is a placeholder.
pub fn has_secret_placeholders(value: &Value) -> bool {
  match value {
    Value::String(s) => placeholder_name(s).is_some(),
    Value::Array(items) => items.iter().any(has_secret_placeholders),
    Value::Object(map) => map.values().any(has_secret_placeholders),
    _ => false,
  }
}

/// Distinct secret names referenced by `value`, in first-seen order.
pub fn placeholder_names(value: &Value) -> Vec<&str> {
  fn walk<'v>(value: &'v Value, out: &mut Vec<&'v str>) {
    match value {
      Value::String(s) => {
        if let Some(name) = placeholder_name(s)
          && !out.contains(&name)
        {
          out.push(name);
        }
      }
      Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
      Value::Object(map) => map.values().for_each(|v| walk(v, out)),
      _ => {}
    }
  }
  let mut out = Vec::new();
  walk(value, &mut out);
  out
}

/// Return a copy of `value` with every placeholder replaced by its secret.
///
/// Each distinct secret is fetched once and each fetch is bounded by
/// `timeout`. The first failure aborts the whole resolution; no partially
/// resolved value is ever returned.
pub async fn resolve_secrets<R: SecretResolver>(
  value: &Value,
  resolver: &R,
  timeout: Duration,
) -> Result<Value> {
  let names = placeholder_names(value);
  let mut resolved = HashMap::with_capacity(names.len());

  for name in names {
    let outcome = match tokio::time::timeout(timeout, resolver.resolve(name)).await {
      Ok(outcome) => outcome,
      Err(_) => Err(SecretError::TimedOut(timeout)),
    };
    match outcome {
      Ok(secret) => {
        resolved.insert(name, secret);
      }
      Err(source) => {
        warn!(secret = name, error = %source, "secret resolution failed");
        return Err(Error::SecretResolution {
          placeholder: format!("{PLACEHOLDER_PREFIX}{name}"),
          source,
        });
      }
    }
  }

  Ok(substitute(value, &resolved))
}

fn substitute(value: &Value, secrets: &HashMap<&str, String>) -> Value {
  match value {
    Value::String(s) => match placeholder_name(s).and_then(|name| secrets.get(name)) {
      Some(secret) => Value::String(secret.clone()),
      None => value.clone(),
    },
    Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, secrets)).collect()),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), substitute(v, secrets)))
        .collect(),
    ),
    _ => value.clone(),
  }
}

// ─── Resolvers ───────────────────────────────────────────────────────────────

/// Resolves from a fixed in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretResolver {
  secrets: HashMap<String, String>,
}

impl StaticSecretResolver {
  pub fn new() -> Self { Self::default() }

  pub fn with(mut self, name: impl Into<String>, secret: impl Into<String>) -> Self {
    self.secrets.insert(name.into(), secret.into());
    self
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticSecretResolver {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      secrets: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }
}

impl SecretResolver for StaticSecretResolver {
  async fn resolve(&self, name: &str) -> Result<String, SecretError> {
    self
      .secrets
      .get(name)
      .cloned()
      .ok_or_else(|| SecretError::Missing(name.to_owned()))
  }
}

/// Fails every placeholder; used when no secret source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSecretResolver;

impl SecretResolver for DisabledSecretResolver {
  async fn resolve(&self, _name: &str) -> Result<String, SecretError> {
    Err(SecretError::Disabled)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  struct SlowResolver;

  impl SecretResolver for SlowResolver {
    async fn resolve(&self, _name: &str) -> Result<String, SecretError> {
      tokio::time::sleep(Duration::from_secs(60)).await;
      Ok("late".into())
    }
  }

  #[test]
  fn only_whole_strings_are_placeholders() {
    assert_eq!(placeholder_name("vault://db-password"), Some("db-password"));
    assert_eq!(placeholder_name("vault://"), None);
    assert_eq!(placeholder_name("see vault://x"), None);
    assert_eq!(placeholder_name("https://example.com"), None);
  }

  #[test]
  fn detects_nested_placeholders() {
    assert!(has_secret_placeholders(&json!({ "db": [{ "pw": "vault://pw" }] })));
    assert!(!has_secret_placeholders(&json!({ "db": [{ "pw": "hunter2" }], "n": 1 })));
  }

  #[tokio::test]
  async fn resolves_every_leaf_and_keeps_the_rest() {
    let resolver = StaticSecretResolver::new().with("pw", "s3cret").with("token", "t0k");
    let value = json!({
      "user": "app",
      "password": "vault://pw",
      "replicas": [{ "password": "vault://pw" }, { "token": "vault://token" }],
      "note": "prefix vault://pw"
    });
    let resolved = resolve_secrets(&value, &resolver, Duration::from_secs(1)).await.unwrap();
    assert_eq!(
      resolved,
      json!({
        "user": "app",
        "password": "s3cret",
        "replicas": [{ "password": "s3cret" }, { "token": "t0k" }],
        "note": "prefix vault://pw"
      })
    );
  }

  #[tokio::test]
  async fn missing_secret_fails_the_whole_read() {
    let resolver = StaticSecretResolver::new().with("pw", "s3cret");
    let value = json!(["vault://pw", "vault://gone"]);
    let err = resolve_secrets(&value, &resolver, Duration::from_secs(1)).await.unwrap_err();
    let Error::SecretResolution { placeholder, source } = err else {
      panic!("expected a secret resolution error")
    };
    assert_eq!(placeholder, "vault://gone");
    assert!(matches!(source, SecretError::Missing(_)));
  }

  #[tokio::test]
  async fn slow_resolver_times_out() {
    let err = resolve_secrets(&json!("vault://x"), &SlowResolver, Duration::from_millis(50))
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      Error::SecretResolution { source: SecretError::TimedOut(_), .. }
    ));
  }

  #[tokio::test]
  async fn disabled_resolver_only_matters_when_placeholders_exist() {
    let plain = json!({ "a": "b" });
    let out = resolve_secrets(&plain, &DisabledSecretResolver, Duration::from_secs(1)).await;
    assert_eq!(out.unwrap(), plain);

    let out =
      resolve_secrets(&json!("vault://a"), &DisabledSecretResolver, Duration::from_secs(1)).await;
    assert!(matches!(out, Err(Error::SecretResolution { source: SecretError::Disabled, .. })));
  }
}
