//! Config entries and their append-only history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A versioned JSON value stored under `(namespace_id, key)`.
///
/// `schema_id` names one specific schema version and never changes; `value`
/// is validated against that version on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
  pub id:           Uuid,
  pub namespace_id: Uuid,
  pub schema_id:    Uuid,
  pub key:          String,
  pub value:        Value,
  /// Equals the version of the latest history record.
  pub version:      u32,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  pub deleted_at:   Option<DateTime<Utc>>,
}

impl ConfigEntry {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConfigEntry {
  pub namespace_id: Uuid,
  pub schema_id:    Uuid,
  pub key:          String,
  pub value:        Value,
}

/// Replacement value for an existing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUpdate {
  pub value:            Value,
  /// When set, the update only applies if the entry is still at this version.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_version: Option<u32>,
}

impl ConfigUpdate {
  pub fn new(value: Value) -> Self { Self { value, expected_version: None } }

  pub fn expecting(mut self, version: u32) -> Self {
    self.expected_version = Some(version);
    self
  }
}

/// The value of an entry at one version. Never updated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub id:              Uuid,
  pub config_entry_id: Uuid,
  pub value:           Value,
  pub version:         u32,
  pub changed_at:      DateTime<Utc>,
}
