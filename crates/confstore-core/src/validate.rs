//! Schema validation of JSON values.
//!
//! Validation is a pure function of `(value, schema document)`. Documents are
//! compiled with the `jsonschema` crate (draft 2020-12) so keyword semantics
//! match the JSON Schema vocabulary exactly: type-specific keywords only
//! constrain values of their type, `pattern` is an ECMA-262 regex and an
//! integral float such as `5.0` is an `integer`. Every violation is
//! collected, each located by its path into the value.

use std::{
  collections::HashMap,
  fmt,
  net::Ipv4Addr,
  str::FromStr,
  sync::{Arc, LazyLock},
};

use chrono::{DateTime, NaiveDate};
use jsonschema::{Draft, ValidationError, error::ValidationErrorKind};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  node::SchemaError,
  path::{Segment, ValuePath},
};

// ─── Results ─────────────────────────────────────────────────────────────────

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
  pub path:    ValuePath,
  pub message: String,
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.path.is_root() {
      write!(f, "{}", self.message)
    } else {
      write!(f, "{}: {}", self.path, self.message)
    }
  }
}

/// The ordered list of violations carried by a rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<Violation>);

impl ValidationErrors {
  pub fn iter(&self) -> impl Iterator<Item = &Violation> { self.0.iter() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Whether any violation sits at the rendered path `path`.
  pub fn mentions(&self, path: &str) -> bool {
    self.0.iter().any(|v| v.path.to_string() == path)
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, v) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{v}")?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
  Accepted,
  Rejected(ValidationErrors),
}

impl ValidationResult {
  pub fn is_accepted(&self) -> bool { matches!(self, Self::Accepted) }

  pub fn into_result(self) -> Result<(), ValidationErrors> {
    match self {
      Self::Accepted => Ok(()),
      Self::Rejected(errors) => Err(errors),
    }
  }
}

// ─── Formats ─────────────────────────────────────────────────────────────────

/// A named string check for the `format` keyword.
pub type FormatCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Format checks by name. Formats without a registered check are treated as
/// annotations and always pass.
#[derive(Clone)]
pub struct FormatRegistry {
  checks: HashMap<String, FormatCheck>,
}

impl FormatRegistry {
  pub fn empty() -> Self { Self { checks: HashMap::new() } }

  pub fn register(
    &mut self,
    name: impl Into<String>,
    check: impl Fn(&str) -> bool + Send + Sync + 'static,
  ) {
    self.checks.insert(name.into(), Arc::new(check));
  }

  pub fn get(&self, name: &str) -> Option<&FormatCheck> { self.checks.get(name) }
}

impl Default for FormatRegistry {
  fn default() -> Self {
    let mut registry = Self::empty();
    registry.register("email", is_email);
    registry.register("uri", |s| url::Url::parse(s).is_ok());
    registry.register("date", |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok());
    registry.register("date-time", |s| DateTime::parse_from_rfc3339(s).is_ok());
    registry.register("ipv4", |s| Ipv4Addr::from_str(s).is_ok());
    registry.register("uuid", |s| Uuid::parse_str(s).is_ok());
    registry
  }
}

impl fmt::Debug for FormatRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<_> = self.checks.keys().collect();
    names.sort();
    f.debug_struct("FormatRegistry").field("formats", &names).finish()
  }
}

fn is_email(s: &str) -> bool {
  let Some((local, domain)) = s.split_once('@') else { return false };
  !local.is_empty()
    && !domain.contains('@')
    && domain.contains('.')
    && !s.chars().any(char::is_whitespace)
    && domain.split('.').all(|label| !label.is_empty())
}

// ─── Validator ───────────────────────────────────────────────────────────────

/// Compiles schema documents with a set of format checks. Holds no mutable
/// state, so one instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Validator {
  formats: FormatRegistry,
}

static DEFAULT_VALIDATOR: LazyLock<Validator> = LazyLock::new(Validator::default);

/// Compile `document` with the built-in format checks.
pub fn compile(document: &Value) -> Result<CompiledSchema, SchemaError> {
  DEFAULT_VALIDATOR.compile(document)
}

/// Validate `value` against `document` with the built-in format checks.
pub fn validate(value: &Value, document: &Value) -> Result<ValidationResult, SchemaError> {
  DEFAULT_VALIDATOR.validate(value, document)
}

impl Validator {
  pub fn with_formats(formats: FormatRegistry) -> Self { Self { formats } }

  /// Compile a schema document. Fails if the document is not a valid JSON
  /// Schema, including patterns that do not compile.
  pub fn compile(&self, document: &Value) -> Result<CompiledSchema, SchemaError> {
    let mut options = jsonschema::options()
      .with_draft(Draft::Draft202012)
      .should_validate_formats(true);
    for (name, check) in &self.formats.checks {
      let check = Arc::clone(check);
      options = options.with_format(name.clone(), move |s: &str| check(s));
    }
    let inner = options.build(document).map_err(|e| {
      let at = ValuePath::from_pointer(&e.instance_path.to_string(), document);
      SchemaError::new(&at.to_string(), e.to_string())
    })?;
    Ok(CompiledSchema { inner })
  }

  pub fn validate(
    &self,
    value: &Value,
    document: &Value,
  ) -> Result<ValidationResult, SchemaError> {
    Ok(self.compile(document)?.validate(value))
  }
}

/// A schema document ready to check values.
pub struct CompiledSchema {
  inner: jsonschema::Validator,
}

impl CompiledSchema {
  pub fn validate(&self, value: &Value) -> ValidationResult {
    let errors: Vec<Violation> =
      self.inner.iter_errors(value).map(|e| violation(&e, value)).collect();
    if errors.is_empty() {
      ValidationResult::Accepted
    } else {
      ValidationResult::Rejected(ValidationErrors(errors))
    }
  }

  pub fn accepts(&self, value: &Value) -> bool { self.inner.is_valid(value) }
}

impl fmt::Debug for CompiledSchema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompiledSchema").finish_non_exhaustive()
  }
}

/// A missing required property is reported at the property's own path.
fn violation(error: &ValidationError<'_>, value: &Value) -> Violation {
  let mut path = ValuePath::from_pointer(&error.instance_path.to_string(), value);
  if let ValidationErrorKind::Required { property } = &error.kind
    && let Some(name) = property.as_str()
  {
    path.push(Segment::Key(name.to_owned()));
  }
  Violation { path, message: error.to_string() }
}
