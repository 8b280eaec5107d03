//! The schema language shared by the validator and the form projector.
//!
//! A stored schema document is plain JSON. Before it is used it is parsed
//! into a closed tree of [`SchemaNode`]s, so every consumer matches
//! exhaustively over [`NodeKind`] instead of dispatching on `"type"` strings.
//! Values are validated against the raw document (see [`crate::validate`]);
//! the tree only drives form projection and rejects shapes the form cannot
//! represent.

use serde_json::{Map, Value};
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A schema document that cannot be used. `path` points into the schema
/// document (not into a value), e.g. `properties.name.pattern`.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", location(.path))]
pub struct SchemaError {
  pub path:    String,
  pub message: String,
}

fn location(path: &str) -> &str { if path.is_empty() { "(root)" } else { path } }

impl SchemaError {
  pub(crate) fn new(path: &str, message: impl Into<String>) -> Self {
    Self { path: path.to_owned(), message: message.into() }
  }
}

type ParseResult<T> = Result<T, SchemaError>;

// ─── Node types ──────────────────────────────────────────────────────────────

/// A parsed schema node: its type-specific shape plus the keywords every
/// node may carry.
#[derive(Debug, Clone)]
pub struct SchemaNode {
  pub kind:     NodeKind,
  pub keywords: Keywords,
}

/// The closed set of node shapes.
#[derive(Debug, Clone)]
pub enum NodeKind {
  Object(ObjectNode),
  Array(ArrayNode),
  String(StringNode),
  Integer(NumericBounds),
  Number(NumericBounds),
  Boolean,
  Null,
  /// No `type`: any JSON value. Type-specific keywords on such a node only
  /// constrain values of their own type and are left to the validator.
  Any,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
  /// Declared properties, in document order.
  pub properties: Vec<(String, SchemaNode)>,
  pub required:   Vec<String>,
  pub additional: AdditionalProperties,
}

impl ObjectNode {
  pub fn property(&self, name: &str) -> Option<&SchemaNode> {
    self
      .properties
      .iter()
      .find_map(|(n, node)| (n == name).then_some(node))
  }

  pub fn is_required(&self, name: &str) -> bool {
    self.required.iter().any(|r| r == name)
  }
}

/// What happens to object keys not listed in `properties`.
#[derive(Debug, Clone, Default)]
pub enum AdditionalProperties {
  /// Any extra key is accepted unchecked (the JSON Schema default).
  #[default]
  Allowed,
  Forbidden,
  Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, Default)]
pub struct ArrayNode {
  /// Applied to every element. `None` accepts any element.
  pub items:     Option<Box<SchemaNode>>,
  pub min_items: Option<u64>,
  pub max_items: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StringNode {
  pub min_length: Option<u64>,
  pub max_length: Option<u64>,
  /// ECMA-262 source, compiled by the validator.
  pub pattern:    Option<String>,
  pub format:     Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NumericBounds {
  pub minimum:           Option<f64>,
  pub maximum:           Option<f64>,
  pub exclusive_minimum: Option<f64>,
  pub exclusive_maximum: Option<f64>,
}

/// Keywords that apply regardless of node kind.
#[derive(Debug, Clone, Default)]
pub struct Keywords {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub default:     Option<Value>,
  pub enum_values: Option<Vec<Value>>,
  pub const_value: Option<Value>,
  pub all_of:      Vec<SchemaNode>,
  pub any_of:      Vec<SchemaNode>,
  pub one_of:      Vec<SchemaNode>,
  pub conditional: Option<Box<Conditional>>,
}

/// `if` / `then` / `else`.
#[derive(Debug, Clone)]
pub struct Conditional {
  pub condition: SchemaNode,
  pub then:      Option<SchemaNode>,
  pub otherwise: Option<SchemaNode>,
}

impl SchemaNode {
  /// A node accepting anything.
  pub fn any() -> Self { Self { kind: NodeKind::Any, keywords: Keywords::default() } }

  /// Parse a schema document.
  pub fn parse(document: &Value) -> Result<Self, SchemaError> {
    parse_node(document, "")
  }

  /// The name used for this node's kind in messages and in `"type"`.
  pub fn type_name(&self) -> &'static str {
    match &self.kind {
      NodeKind::Object(_) => "object",
      NodeKind::Array(_) => "array",
      NodeKind::String(_) => "string",
      NodeKind::Integer(_) => "integer",
      NodeKind::Number(_) => "number",
      NodeKind::Boolean => "boolean",
      NodeKind::Null => "null",
      NodeKind::Any => "any",
    }
  }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

fn join(path: &str, key: &str) -> String {
  if path.is_empty() { key.to_owned() } else { format!("{path}.{key}") }
}

fn parse_node(doc: &Value, path: &str) -> ParseResult<SchemaNode> {
  let obj = match doc {
    Value::Object(obj) => obj,
    Value::Bool(true) => return Ok(SchemaNode::any()),
    other => {
      return Err(SchemaError::new(
        path,
        format!("a schema must be an object, found {other}"),
      ));
    }
  };

  if obj.contains_key("$ref") {
    return Err(SchemaError::new(path, "$ref is not supported"));
  }

  let type_name = match obj.get("type") {
    Some(Value::String(t)) => Some(t.as_str()),
    Some(Value::Array(_)) => {
      return Err(SchemaError::new(
        &join(path, "type"),
        "type unions are not supported; use anyOf",
      ));
    }
    Some(other) => {
      return Err(SchemaError::new(
        &join(path, "type"),
        format!("expected a type name, found {other}"),
      ));
    }
    None => None,
  };

  let kind = match type_name {
    Some("object") => NodeKind::Object(parse_object(obj, path)?),
    Some("array") => NodeKind::Array(parse_array(obj, path)?),
    Some("string") => NodeKind::String(parse_string(obj, path)?),
    Some("integer") => NodeKind::Integer(parse_bounds(obj, path)?),
    Some("number") => NodeKind::Number(parse_bounds(obj, path)?),
    Some("boolean") => NodeKind::Boolean,
    Some("null") => NodeKind::Null,
    Some(unknown) => {
      return Err(SchemaError::new(
        &join(path, "type"),
        format!("unknown type {unknown:?}"),
      ));
    }
    None => NodeKind::Any,
  };

  Ok(SchemaNode { kind, keywords: parse_keywords(obj, path)? })
}

fn parse_object(obj: &Map<String, Value>, path: &str) -> ParseResult<ObjectNode> {
  let mut node = ObjectNode::default();

  if let Some(props) = obj.get("properties") {
    let props_path = join(path, "properties");
    let Value::Object(props) = props else {
      return Err(SchemaError::new(&props_path, "properties must be an object"));
    };
    for (name, sub) in props {
      node
        .properties
        .push((name.clone(), parse_node(sub, &join(&props_path, name))?));
    }
  }

  if let Some(required) = obj.get("required") {
    let req_path = join(path, "required");
    let Value::Array(names) = required else {
      return Err(SchemaError::new(&req_path, "required must be an array of names"));
    };
    for name in names {
      let Value::String(name) = name else {
        return Err(SchemaError::new(
          &req_path,
          format!("required entries must be strings, found {name}"),
        ));
      };
      node.required.push(name.clone());
    }
  }

  node.additional = match obj.get("additionalProperties") {
    None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
    Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
    Some(sub) => AdditionalProperties::Schema(Box::new(parse_node(
      sub,
      &join(path, "additionalProperties"),
    )?)),
  };

  Ok(node)
}

fn parse_array(obj: &Map<String, Value>, path: &str) -> ParseResult<ArrayNode> {
  let items = match obj.get("items") {
    None => None,
    Some(Value::Array(_)) => {
      return Err(SchemaError::new(
        &join(path, "items"),
        "tuple-form items are not supported; items must be a single schema",
      ));
    }
    Some(sub) => Some(Box::new(parse_node(sub, &join(path, "items"))?)),
  };
  Ok(ArrayNode {
    items,
    min_items: get_count(obj, path, "minItems")?,
    max_items: get_count(obj, path, "maxItems")?,
  })
}

fn parse_string(obj: &Map<String, Value>, path: &str) -> ParseResult<StringNode> {
  let pattern = match obj.get("pattern") {
    None => None,
    Some(Value::String(source)) => Some(source.clone()),
    Some(other) => {
      return Err(SchemaError::new(
        &join(path, "pattern"),
        format!("pattern must be a string, found {other}"),
      ));
    }
  };
  let format = match obj.get("format") {
    None => None,
    Some(Value::String(f)) => Some(f.clone()),
    Some(other) => {
      return Err(SchemaError::new(
        &join(path, "format"),
        format!("format must be a string, found {other}"),
      ));
    }
  };
  Ok(StringNode {
    min_length: get_count(obj, path, "minLength")?,
    max_length: get_count(obj, path, "maxLength")?,
    pattern,
    format,
  })
}

fn parse_bounds(obj: &Map<String, Value>, path: &str) -> ParseResult<NumericBounds> {
  Ok(NumericBounds {
    minimum:           get_number(obj, path, "minimum")?,
    maximum:           get_number(obj, path, "maximum")?,
    exclusive_minimum: get_number(obj, path, "exclusiveMinimum")?,
    exclusive_maximum: get_number(obj, path, "exclusiveMaximum")?,
  })
}

fn parse_keywords(obj: &Map<String, Value>, path: &str) -> ParseResult<Keywords> {
  let enum_values = match obj.get("enum") {
    None => None,
    Some(Value::Array(values)) if !values.is_empty() => Some(values.clone()),
    Some(_) => {
      return Err(SchemaError::new(
        &join(path, "enum"),
        "enum must be a non-empty array",
      ));
    }
  };

  let conditional = match obj.get("if") {
    None => None,
    Some(cond) => Some(Box::new(Conditional {
      condition: parse_node(cond, &join(path, "if"))?,
      then:      obj
        .get("then")
        .map(|t| parse_node(t, &join(path, "then")))
        .transpose()?,
      otherwise: obj
        .get("else")
        .map(|e| parse_node(e, &join(path, "else")))
        .transpose()?,
    })),
  };

  Ok(Keywords {
    title: get_text(obj, "title"),
    description: get_text(obj, "description"),
    default: obj.get("default").cloned(),
    enum_values,
    const_value: obj.get("const").cloned(),
    all_of: parse_list(obj, path, "allOf")?,
    any_of: parse_list(obj, path, "anyOf")?,
    one_of: parse_list(obj, path, "oneOf")?,
    conditional,
  })
}

fn parse_list(
  obj: &Map<String, Value>,
  path: &str,
  key: &str,
) -> ParseResult<Vec<SchemaNode>> {
  let Some(list) = obj.get(key) else { return Ok(Vec::new()) };
  let list_path = join(path, key);
  let Value::Array(list) = list else {
    return Err(SchemaError::new(&list_path, format!("{key} must be an array")));
  };
  if list.is_empty() {
    return Err(SchemaError::new(&list_path, format!("{key} must not be empty")));
  }
  list
    .iter()
    .enumerate()
    .map(|(i, sub)| parse_node(sub, &format!("{list_path}[{i}]")))
    .collect()
}

fn get_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
  obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn get_count(obj: &Map<String, Value>, path: &str, key: &str) -> ParseResult<Option<u64>> {
  match obj.get(key) {
    None => Ok(None),
    Some(v) => v.as_u64().map(Some).ok_or_else(|| {
      SchemaError::new(
        &join(path, key),
        format!("{key} must be a non-negative integer, found {v}"),
      )
    }),
  }
}

fn get_number(obj: &Map<String, Value>, path: &str, key: &str) -> ParseResult<Option<f64>> {
  match obj.get(key) {
    None => Ok(None),
    Some(v) => v.as_f64().map(Some).ok_or_else(|| {
      SchemaError::new(&join(path, key), format!("{key} must be a number, found {v}"))
    }),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn parses_nested_object_in_declaration_order() {
    let node = SchemaNode::parse(&json!({
      "type": "object",
      "required": ["name"],
      "properties": {
        "name": { "type": "string", "minLength": 1 },
        "port": { "type": "integer", "maximum": 65535 },
        "tags": { "type": "array", "items": { "type": "string" } }
      }
    }))
    .unwrap();

    let NodeKind::Object(obj) = &node.kind else { panic!("expected object") };
    let names: Vec<_> = obj.properties.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["name", "port", "tags"]);
    assert!(obj.is_required("name"));
    assert!(!obj.is_required("port"));
    assert!(matches!(obj.additional, AdditionalProperties::Allowed));
    assert!(matches!(
      obj.property("tags").map(|n| &n.kind),
      Some(NodeKind::Array(ArrayNode { items: Some(_), .. }))
    ));
  }

  #[test]
  fn unknown_type_is_rejected_with_path() {
    let err = SchemaNode::parse(&json!({
      "type": "object",
      "properties": { "x": { "type": "float" } }
    }))
    .unwrap_err();
    assert_eq!(err.path, "properties.x.type");
    assert!(err.message.contains("float"));
  }

  #[test]
  fn lookaround_patterns_are_kept_verbatim() {
    let node = SchemaNode::parse(&json!({ "type": "string", "pattern": "^(?!admin$).+" }))
      .unwrap();
    let NodeKind::String(rules) = node.kind else { panic!("expected string") };
    assert_eq!(rules.pattern.as_deref(), Some("^(?!admin$).+"));
  }

  #[test]
  fn non_object_schema_is_rejected() {
    assert!(SchemaNode::parse(&json!("string")).is_err());
    assert!(SchemaNode::parse(&json!({ "type": "array", "items": [{}] })).is_err());
    assert!(SchemaNode::parse(&json!({ "required": "name" })).is_err());
    assert!(SchemaNode::parse(&json!({ "$ref": "#/defs/x" })).is_err());
  }

  #[test]
  fn untyped_nodes_are_any() {
    for doc in [
      json!({ "properties": { "a": {} } }),
      json!({ "maxLength": 3 }),
      json!({ "minimum": 1 }),
      json!({ "enum": [1, "a"] }),
    ] {
      assert_eq!(SchemaNode::parse(&doc).unwrap().type_name(), "any", "{doc}");
    }
  }

  #[test]
  fn conditionals_and_combinators_are_parsed() {
    let node = SchemaNode::parse(&json!({
      "type": "object",
      "if": { "properties": { "kind": { "const": "db" } } },
      "then": { "required": ["dsn"] },
      "anyOf": [{ "required": ["a"] }, { "required": ["b"] }]
    }))
    .unwrap();
    assert!(node.keywords.conditional.is_some());
    assert_eq!(node.keywords.any_of.len(), 2);
  }

  #[test]
  fn additional_properties_variants() {
    let strict = SchemaNode::parse(&json!({
      "type": "object", "additionalProperties": false
    }))
    .unwrap();
    let NodeKind::Object(obj) = strict.kind else { panic!() };
    assert!(matches!(obj.additional, AdditionalProperties::Forbidden));

    let typed = SchemaNode::parse(&json!({
      "type": "object", "additionalProperties": { "type": "integer" }
    }))
    .unwrap();
    let NodeKind::Object(obj) = typed.kind else { panic!() };
    assert!(matches!(obj.additional, AdditionalProperties::Schema(_)));
  }
}
