//! Schema definitions: named, versioned, immutable schema documents.
//!
//! A row's `structure` never changes after insertion. Publishing an edit
//! inserts a new row with the same `name` and `version + 1`; config entries
//! stay bound to the row (and therefore the version) they were written
//! against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  node::SchemaNode,
  validate::{compile, validate},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
  pub id:          Uuid,
  pub name:        String,
  /// Starts at 1 and increases by one per published edit of `name`.
  pub version:     u32,
  pub structure:   Value,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub deleted_at:  Option<DateTime<Utc>>,
}

impl SchemaDefinition {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  /// Parse the stored structure.
  pub fn node(&self) -> Result<SchemaNode> { Ok(SchemaNode::parse(&self.structure)?) }

  /// Check `value` against this definition's structure.
  pub fn check(&self, value: &Value) -> Result<()> { check_value(&self.structure, value) }
}

/// Input for creating version 1 of a new schema name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchema {
  pub name:        String,
  pub structure:   Value,
  #[serde(default)]
  pub description: Option<String>,
}

/// Input for publishing the next version of an existing schema.
///
/// A missing `description` carries the previous version's over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRevision {
  pub structure:   Value,
  #[serde(default)]
  pub description: Option<String>,
}

/// Check that `structure` is a JSON Schema the validator compiles and the
/// form projector can represent.
pub fn check_structure(structure: &Value) -> Result<()> {
  SchemaNode::parse(structure)?;
  compile(structure)?;
  Ok(())
}

/// Validate `value` against `structure`.
pub fn check_value(structure: &Value, value: &Value) -> Result<()> {
  validate(value, structure)?.into_result().map_err(Error::Validation)
}
