//! Secret resolvers selectable from [`SecretsConfig`](crate::SecretsConfig).

use std::{io, path::PathBuf};

use confstore_core::secret::{DisabledSecretResolver, SecretError, SecretResolver};
use tracing::debug;

use crate::{SecretSource, SecretsConfig};

/// Secret names map to files and variables, so they are kept to a safe
/// alphabet.
fn check_name(name: &str) -> Result<(), SecretError> {
  let valid = !name.starts_with('.')
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
  if valid { Ok(()) } else { Err(SecretError::InvalidName(name.to_owned())) }
}

// ─── Environment ─────────────────────────────────────────────────────────────

/// Reads `db-password` from `${prefix}DB_PASSWORD`.
#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
  prefix: String,
}

impl EnvSecretResolver {
  pub fn new(prefix: impl Into<String>) -> Self { Self { prefix: prefix.into() } }

  pub fn variable(&self, name: &str) -> String {
    let suffix: String = name
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
      .collect();
    format!("{}{suffix}", self.prefix)
  }
}

impl SecretResolver for EnvSecretResolver {
  async fn resolve(&self, name: &str) -> Result<String, SecretError> {
    check_name(name)?;
    let var = self.variable(name);
    debug!(secret = name, var = %var, "reading secret from environment");
    std::env::var(&var).map_err(|_| SecretError::Missing(name.to_owned()))
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Reads `db-password` from the file `<dir>/db-password`, the layout used by
/// mounted secret volumes.
#[derive(Debug, Clone)]
pub struct DirSecretResolver {
  dir: PathBuf,
}

impl DirSecretResolver {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }
}

impl SecretResolver for DirSecretResolver {
  async fn resolve(&self, name: &str) -> Result<String, SecretError> {
    check_name(name)?;
    let path = self.dir.join(name);
    debug!(secret = name, path = %path.display(), "reading secret file");
    match tokio::fs::read_to_string(&path).await {
      Ok(contents) => Ok(contents.trim_end_matches(['\n', '\r']).to_owned()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SecretError::Missing(name.to_owned())),
      Err(e) => Err(e.into()),
    }
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The resolver chosen at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredResolver {
  Disabled(DisabledSecretResolver),
  Env(EnvSecretResolver),
  Dir(DirSecretResolver),
}

impl ConfiguredResolver {
  pub fn from_config(cfg: &SecretsConfig) -> Self {
    match cfg.source {
      SecretSource::None => Self::Disabled(DisabledSecretResolver),
      SecretSource::Env => Self::Env(EnvSecretResolver::new(cfg.env_prefix.clone())),
      SecretSource::Dir => Self::Dir(DirSecretResolver::new(cfg.dir.clone())),
    }
  }
}

impl SecretResolver for ConfiguredResolver {
  async fn resolve(&self, name: &str) -> Result<String, SecretError> {
    match self {
      Self::Disabled(r) => r.resolve(name).await,
      Self::Env(r) => r.resolve(name).await,
      Self::Dir(r) => r.resolve(name).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("confstore-secrets-{tag}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn names_are_restricted() {
    assert!(check_name("db-password").is_ok());
    assert!(check_name("api_key.v2").is_ok());
    assert!(check_name("../etc/passwd").is_err());
    assert!(check_name("a/b").is_err());
    assert!(check_name(".hidden").is_err());
  }

  #[test]
  fn env_variable_names_are_upper_snake() {
    let r = EnvSecretResolver::new("APP_SECRET_");
    assert_eq!(r.variable("db-password"), "APP_SECRET_DB_PASSWORD");
    assert_eq!(r.variable("api.key"), "APP_SECRET_API_KEY");
  }

  #[tokio::test]
  async fn env_resolver_reads_variables() {
    let r = EnvSecretResolver::new("CONFSTORE_TEST_SECRET_");
    // SAFETY: this test is the only reader or writer of this variable.
    unsafe { std::env::set_var("CONFSTORE_TEST_SECRET_TOKEN", "abc123") };
    assert_eq!(r.resolve("token").await.unwrap(), "abc123");
    assert!(matches!(r.resolve("absent").await, Err(SecretError::Missing(_))));
  }

  #[tokio::test]
  async fn dir_resolver_reads_files() {
    let dir = scratch_dir("read");
    fs::write(dir.join("db-password"), "hunter2\n").unwrap();
    let r = DirSecretResolver::new(&dir);

    assert_eq!(r.resolve("db-password").await.unwrap(), "hunter2");
    assert!(matches!(r.resolve("nope").await, Err(SecretError::Missing(_))));
    assert!(matches!(r.resolve("../db-password").await, Err(SecretError::InvalidName(_))));

    fs::remove_dir_all(dir).unwrap();
  }

  #[tokio::test]
  async fn unconfigured_source_is_disabled() {
    let r = ConfiguredResolver::from_config(&SecretsConfig::default());
    assert!(matches!(r.resolve("anything").await, Err(SecretError::Disabled)));
  }
}
