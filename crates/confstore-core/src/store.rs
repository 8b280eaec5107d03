//! The `ConfigStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `confstore-store-sqlite`). The API layer and the reference reader depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
  entry::{ConfigEntry, ConfigUpdate, HistoryRecord, NewConfigEntry},
  namespace::{Namespace, NewNamespace},
  schema::{NewSchema, SchemaDefinition, SchemaRevision},
};

// ─── Query type ──────────────────────────────────────────────────────────────

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Parameters for [`ConfigStore::list_configs`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigQuery {
  pub namespace_id:    Option<Uuid>,
  pub schema_id:       Option<Uuid>,
  pub include_deleted: bool,
  pub offset:          usize,
  pub limit:           usize,
}

impl Default for ConfigQuery {
  fn default() -> Self {
    Self {
      namespace_id:    None,
      schema_id:       None,
      include_deleted: false,
      offset:          0,
      limit:           DEFAULT_LIST_LIMIT,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a config store backend.
///
/// Every write is validated and committed atomically: a config entry and the
/// history record for its current version appear together or not at all, and
/// two writers can never both move an entry from version N to N+1.
///
/// Deletes are soft. Deleting something that is already deleted fails with a
/// not-found error.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ConfigStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Namespaces ────────────────────────────────────────────────────────

  /// Fails if an active namespace already has the name.
  fn create_namespace(
    &self,
    input: NewNamespace,
  ) -> impl Future<Output = Result<Namespace, Self::Error>> + Send + '_;

  /// Retrieve a namespace by id, deleted or not.
  fn get_namespace(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Namespace>, Self::Error>> + Send + '_;

  /// Retrieve the active namespace with this name.
  fn get_namespace_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Namespace>, Self::Error>> + Send + 'a;

  fn list_namespaces(
    &self,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Vec<Namespace>, Self::Error>> + Send + '_;

  fn delete_namespace(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Namespace, Self::Error>> + Send + '_;

  // ── Schemas ───────────────────────────────────────────────────────────

  /// Create the first live version of a schema name. Fails with
  /// `DuplicateSchemaName` while any version of the name is active; once all
  /// are deleted the name continues at `max(version) + 1`.
  fn create_schema(
    &self,
    input: NewSchema,
  ) -> impl Future<Output = Result<SchemaDefinition, Self::Error>> + Send + '_;

  /// Publish the next version of the schema `base_id` belongs to. The new row
  /// gets `max(version) + 1` for the name and a fresh id; `base_id` is left
  /// untouched.
  fn revise_schema(
    &self,
    base_id: Uuid,
    revision: SchemaRevision,
  ) -> impl Future<Output = Result<SchemaDefinition, Self::Error>> + Send + '_;

  /// Retrieve a schema version by id. Soft-deleted rows still resolve.
  fn get_schema(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SchemaDefinition>, Self::Error>> + Send + '_;

  /// Ordered by name, newest version first within a name.
  fn list_schemas(
    &self,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Vec<SchemaDefinition>, Self::Error>> + Send + '_;

  /// Every version of `name`, newest first, deleted ones included.
  fn list_schema_versions<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<SchemaDefinition>, Self::Error>> + Send + 'a;

  fn delete_schema(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<SchemaDefinition, Self::Error>> + Send + '_;

  // ── Config entries ────────────────────────────────────────────────────

  /// Validate and insert a new entry at version 1, with its first history
  /// record.
  fn create_config(
    &self,
    input: NewConfigEntry,
  ) -> impl Future<Output = Result<ConfigEntry, Self::Error>> + Send + '_;

  /// Validate the new value against the entry's bound schema, bump the
  /// version and append a history record.
  fn update_config(
    &self,
    id: Uuid,
    update: ConfigUpdate,
  ) -> impl Future<Output = Result<ConfigEntry, Self::Error>> + Send + '_;

  fn delete_config(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<ConfigEntry, Self::Error>> + Send + '_;

  fn get_config(
    &self,
    id: Uuid,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Option<ConfigEntry>, Self::Error>> + Send + '_;

  /// The active entry stored under `key` in the namespace.
  fn get_config_by_key<'a>(
    &'a self,
    namespace_id: Uuid,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<ConfigEntry>, Self::Error>> + Send + 'a;

  /// Ordered by key.
  fn list_configs<'a>(
    &'a self,
    query: &'a ConfigQuery,
  ) -> impl Future<Output = Result<Vec<ConfigEntry>, Self::Error>> + Send + 'a;

  // ── History ───────────────────────────────────────────────────────────

  /// All history records of an entry in version order. Readable after the
  /// entry is deleted; fails if the entry never existed.
  fn history(
    &self,
    config_id: Uuid,
  ) -> impl Future<Output = Result<Vec<HistoryRecord>, Self::Error>> + Send + '_;

  fn history_version(
    &self,
    config_id: Uuid,
    version: u32,
  ) -> impl Future<Output = Result<Option<HistoryRecord>, Self::Error>> + Send + '_;
}
