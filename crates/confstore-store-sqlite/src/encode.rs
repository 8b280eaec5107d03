//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. JSON documents (schema
//! structures, config values) are stored as compact JSON text with key order
//! preserved. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use confstore_core::{
  entry::{ConfigEntry, HistoryRecord},
  namespace::Namespace,
  schema::SchemaDefinition,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

pub fn encode_json(value: &Value) -> Result<String> { Ok(serde_json::to_string(value)?) }

pub fn decode_json(s: &str) -> Result<Value> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const NAMESPACE_COLUMNS: &str = "id, name, description, created_at, deleted_at";

/// Raw strings read directly from a `namespaces` row.
pub struct RawNamespace {
  pub id:          String,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  String,
  pub deleted_at:  Option<String>,
}

impl RawNamespace {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      created_at:  row.get(3)?,
      deleted_at:  row.get(4)?,
    })
  }

  pub fn into_namespace(self) -> Result<Namespace> {
    Ok(Namespace {
      id:          decode_uuid(&self.id)?,
      name:        self.name,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
      deleted_at:  decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

pub const SCHEMA_COLUMNS: &str =
  "id, name, version, structure, description, created_at, deleted_at";

/// Raw strings read directly from a `schemas` row.
pub struct RawSchema {
  pub id:          String,
  pub name:        String,
  pub version:     u32,
  pub structure:   String,
  pub description: Option<String>,
  pub created_at:  String,
  pub deleted_at:  Option<String>,
}

impl RawSchema {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      version:     row.get(2)?,
      structure:   row.get(3)?,
      description: row.get(4)?,
      created_at:  row.get(5)?,
      deleted_at:  row.get(6)?,
    })
  }

  pub fn into_schema(self) -> Result<SchemaDefinition> {
    Ok(SchemaDefinition {
      id:          decode_uuid(&self.id)?,
      name:        self.name,
      version:     self.version,
      structure:   decode_json(&self.structure)?,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
      deleted_at:  decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

pub const CONFIG_COLUMNS: &str = "id, namespace_id, schema_id, key, value, version, \
                                  created_at, updated_at, deleted_at";

/// Raw strings read directly from a `config_entries` row.
pub struct RawConfigEntry {
  pub id:           String,
  pub namespace_id: String,
  pub schema_id:    String,
  pub key:          String,
  pub value:        String,
  pub version:      u32,
  pub created_at:   String,
  pub updated_at:   String,
  pub deleted_at:   Option<String>,
}

impl RawConfigEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      namespace_id: row.get(1)?,
      schema_id:    row.get(2)?,
      key:          row.get(3)?,
      value:        row.get(4)?,
      version:      row.get(5)?,
      created_at:   row.get(6)?,
      updated_at:   row.get(7)?,
      deleted_at:   row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<ConfigEntry> {
    Ok(ConfigEntry {
      id:           decode_uuid(&self.id)?,
      namespace_id: decode_uuid(&self.namespace_id)?,
      schema_id:    decode_uuid(&self.schema_id)?,
      key:          self.key,
      value:        decode_json(&self.value)?,
      version:      self.version,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
      deleted_at:   decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

pub const HISTORY_COLUMNS: &str = "id, config_entry_id, value, version, changed_at";

/// Raw strings read directly from a `config_history` row.
pub struct RawHistoryRecord {
  pub id:              String,
  pub config_entry_id: String,
  pub value:           String,
  pub version:         u32,
  pub changed_at:      String,
}

impl RawHistoryRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      config_entry_id: row.get(1)?,
      value:           row.get(2)?,
      version:         row.get(3)?,
      changed_at:      row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<HistoryRecord> {
    Ok(HistoryRecord {
      id:              decode_uuid(&self.id)?,
      config_entry_id: decode_uuid(&self.config_entry_id)?,
      value:           decode_json(&self.value)?,
      version:         self.version,
      changed_at:      decode_dt(&self.changed_at)?,
    })
  }
}
