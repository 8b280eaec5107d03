//! Server assembly for confstore: runtime configuration, secret resolver
//! selection and the top-level router.

pub mod secrets;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use confstore_api::{AppState, api_router};
use confstore_core::{secret::SecretResolver, store::ConfigStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use secrets::ConfiguredResolver;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CONFSTORE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub secrets:    SecretsConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8000,
      store_path: PathBuf::from("~/.local/share/confstore/confstore.db"),
      secrets:    SecretsConfig::default(),
    }
  }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
  #[default]
  None,
  Env,
  Dir,
}

/// Where `vault://` placeholders are resolved from.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecretsConfig {
  pub source:     SecretSource,
  /// Prefix for environment variable lookups (`source = "env"`).
  pub env_prefix: String,
  /// Directory holding one file per secret (`source = "dir"`).
  pub dir:        PathBuf,
  pub timeout_ms: u64,
}

impl Default for SecretsConfig {
  fn default() -> Self {
    Self {
      source:     SecretSource::None,
      env_prefix: "CONFSTORE_SECRET_".into(),
      dir:        PathBuf::from("/run/secrets"),
      timeout_ms: 5_000,
    }
  }
}

impl SecretsConfig {
  pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full HTTP application: the JSON API with request tracing.
pub fn router<S, R>(store: Arc<S>, resolver: Arc<R>, secrets: &SecretsConfig) -> Router
where
  S: ConfigStore + 'static,
  R: SecretResolver + 'static,
{
  let state = AppState::new(store, resolver).with_secret_timeout(secrets.timeout());
  api_router(state).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn load(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    let cfg = load("");
    assert_eq!(cfg.port, 8000);
    assert_eq!(cfg.secrets.source, SecretSource::None);
    assert_eq!(cfg.secrets.timeout(), Duration::from_secs(5));
  }

  #[test]
  fn secrets_section_is_read() {
    let cfg = load(
      r#"
        port = 9090

        [secrets]
        source = "dir"
        dir = "/etc/confstore/secrets"
        timeout_ms = 250
      "#,
    );
    assert_eq!(cfg.port, 9090);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.secrets.source, SecretSource::Dir);
    assert_eq!(cfg.secrets.dir, PathBuf::from("/etc/confstore/secrets"));
    assert_eq!(cfg.secrets.timeout(), Duration::from_millis(250));
    assert_eq!(cfg.secrets.env_prefix, "CONFSTORE_SECRET_");
  }
}
