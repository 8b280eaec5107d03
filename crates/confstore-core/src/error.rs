//! Error types for `confstore-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{node::SchemaError, secret::SecretError, validate::ValidationErrors};

#[derive(Debug, Error)]
pub enum Error {
  #[error("namespace not found: {0}")]
  NamespaceNotFound(String),

  #[error("schema not found: {0}")]
  SchemaNotFound(Uuid),

  #[error("config entry not found: {0}")]
  ConfigNotFound(Uuid),

  #[error("no config entry {key:?} in namespace {namespace:?}")]
  KeyNotFound { namespace: String, key: String },

  #[error("config entry {config_id} has no version {version}")]
  VersionNotFound { config_id: Uuid, version: u32 },

  #[error("no item with {field} = {value:?} in {namespace}/{key}")]
  ItemNotFound {
    namespace: String,
    key:       String,
    field:     String,
    value:     String,
  },

  #[error("key {key:?} already exists in namespace {namespace_id}")]
  DuplicateKey { namespace_id: Uuid, key: String },

  #[error("namespace {0:?} already exists")]
  DuplicateNamespace(String),

  #[error("schema {0:?} already exists; publish a new version instead")]
  DuplicateSchemaName(String),

  #[error("invalid schema: {0}")]
  InvalidSchema(#[from] SchemaError),

  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("cannot resolve secret placeholder {placeholder:?}: {source}")]
  SecretResolution {
    placeholder: String,
    #[source]
    source:      SecretError,
  },

  #[error("config entry {id} is at version {current}, not {expected}")]
  VersionConflict { id: Uuid, expected: u32, current: u32 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend failure that has no domain meaning.
  pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(err))
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::NamespaceNotFound(_)
        | Self::SchemaNotFound(_)
        | Self::ConfigNotFound(_)
        | Self::KeyNotFound { .. }
        | Self::VersionNotFound { .. }
        | Self::ItemNotFound { .. }
    )
  }
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::Validation(errors) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
