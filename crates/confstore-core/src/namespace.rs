//! Namespaces: isolation scopes that group config entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
  pub id:          Uuid,
  /// Unique among namespaces that are not deleted.
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub deleted_at:  Option<DateTime<Utc>>,
}

impl Namespace {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNamespace {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

impl NewNamespace {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), description: None }
  }
}
