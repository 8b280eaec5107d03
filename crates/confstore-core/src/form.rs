//! Bidirectional mapping between a schema and an editable widget tree.
//!
//! [`project`] turns a schema (and optionally a current value) into a
//! [`Widget`] tree; [`reify`] walks the same schema in lockstep with an edited
//! tree and produces a JSON value. For every value `v` the validator accepts
//! under schema `s`, `reify(s, &project(s, Some(&v))) == Ok(v)`.
//!
//! [`FormState`] is the immutable editing state a client threads through its
//! UI: every edit and every switch between form and raw-JSON mode returns a
//! new state derived through the same `project`/`reify` pair.

use std::{fmt, str::FromStr, sync::Arc};

use serde_json::{Map, Number, Value};

use crate::{
  node::{AdditionalProperties, NodeKind, SchemaNode},
  path::{Segment, ValuePath},
};

// ─── Widget tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
  /// Free text for a `string` node.
  Text(String),
  /// Numeric text for an `integer` or `number` node; parsed on reify.
  Numeric(String),
  /// Binary choice for a `boolean` node.
  Toggle(bool),
  /// Discrete choice over a node's `enum` values.
  Choice { options: Vec<Value>, selected: Option<usize> },
  /// One field per property of an `object` node.
  Group(Vec<Field>),
  /// Ordered, growable list of element widgets for an `array` node.
  List(Vec<Widget>),
  /// Opaque JSON text, for nodes with no dedicated widget or values that do
  /// not fit their node.
  Raw(String),
}

/// A property slot inside a [`Widget::Group`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
  pub name:     String,
  pub required: bool,
  /// `false` for keys carried through `additionalProperties`.
  pub declared: bool,
  /// Absent optional fields are left out of the reified object.
  pub present:  bool,
  pub widget:   Widget,
}

impl Widget {
  /// The widget at `path`, following field names and list indices.
  pub fn at(&self, path: &ValuePath) -> Option<&Widget> {
    path.segments().iter().try_fold(self, |w, seg| match (w, seg) {
      (Widget::Group(fields), Segment::Key(k)) => {
        fields.iter().find(|f| &f.name == k).map(|f| &f.widget)
      }
      (Widget::List(items), Segment::Index(i)) => items.get(*i),
      _ => None,
    })
  }

  /// The field at `path`, if `path` ends in a field name.
  pub fn field_at(&self, path: &ValuePath) -> Option<&Field> {
    let Some(Segment::Key(name)) = path.last() else { return None };
    match self.at(&path.parent()?)? {
      Widget::Group(fields) => fields.iter().find(|f| &f.name == name),
      _ => None,
    }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A problem with one field of a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub path:    ValuePath,
  pub message: String,
}

impl FieldError {
  fn new(path: &ValuePath, message: impl Into<String>) -> Self {
    Self { path: path.clone(), message: message.into() }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.path.is_root() {
      f.write_str(&self.message)
    } else {
      write!(f, "{}: {}", self.path, self.message)
    }
  }
}

impl std::error::Error for FieldError {}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Build the widget tree for `schema`, filled from `value` when given.
pub fn project(schema: &SchemaNode, value: Option<&Value>) -> Widget {
  let value = value.or(schema.keywords.default.as_ref());

  if let Some(options) = &schema.keywords.enum_values {
    return match value {
      None => Widget::Choice { options: options.clone(), selected: None },
      Some(v) => match options.iter().position(|o| o == v) {
        Some(i) => Widget::Choice { options: options.clone(), selected: Some(i) },
        None => raw(v),
      },
    };
  }

  match (&schema.kind, value) {
    (NodeKind::String(_), None) => Widget::Text(String::new()),
    (NodeKind::String(_), Some(Value::String(s))) => Widget::Text(s.clone()),

    (NodeKind::Integer(_) | NodeKind::Number(_), None) => Widget::Numeric(String::new()),
    (NodeKind::Integer(_) | NodeKind::Number(_), Some(Value::Number(n))) => {
      Widget::Numeric(n.to_string())
    }

    (NodeKind::Boolean, None) => Widget::Toggle(false),
    (NodeKind::Boolean, Some(Value::Bool(b))) => Widget::Toggle(*b),

    (NodeKind::Object(obj), None) => Widget::Group(
      obj
        .properties
        .iter()
        .map(|(name, sub)| {
          let widget = project(sub, None);
          let required = obj.is_required(name);
          let is_container = matches!(widget, Widget::Group(_) | Widget::List(_));
          Field {
            name: name.clone(),
            required,
            declared: true,
            present: sub.keywords.default.is_some() || (required && is_container),
            widget,
          }
        })
        .collect(),
    ),
    (NodeKind::Object(obj), Some(Value::Object(map))) => {
      let mut fields: Vec<Field> = obj
        .properties
        .iter()
        .map(|(name, sub)| {
          let current = map.get(name);
          Field {
            name:     name.clone(),
            required: obj.is_required(name),
            declared: true,
            present:  current.is_some(),
            widget:   match current {
              Some(v) => project(sub, Some(v)),
              None => project(sub, None),
            },
          }
        })
        .collect();
      for (key, v) in map {
        if obj.property(key).is_some() {
          continue;
        }
        let widget = match &obj.additional {
          AdditionalProperties::Schema(sub) => project(sub, Some(v)),
          AdditionalProperties::Allowed | AdditionalProperties::Forbidden => raw(v),
        };
        fields.push(Field {
          name: key.clone(),
          required: false,
          declared: false,
          present: true,
          widget,
        });
      }
      Widget::Group(fields)
    }

    (NodeKind::Array(_), None) => Widget::List(Vec::new()),
    (NodeKind::Array(arr), Some(Value::Array(items))) => Widget::List(
      items
        .iter()
        .map(|item| match &arr.items {
          Some(sub) => project(sub, Some(item)),
          None => raw(item),
        })
        .collect(),
    ),

    (NodeKind::Null | NodeKind::Any, None) => Widget::Raw(String::new()),
    (_, Some(v)) => raw(v),
  }
}

fn raw(value: &Value) -> Widget {
  Widget::Raw(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
}

// ─── Reification ─────────────────────────────────────────────────────────────

/// Turn an edited widget tree back into a value shaped by `schema`.
///
/// Every field that cannot be converted is reported; nothing is returned
/// unless the whole tree converts.
pub fn reify(schema: &SchemaNode, widget: &Widget) -> Result<Value, Vec<FieldError>> {
  let mut errors = Vec::new();
  let value = reify_node(schema, widget, &ValuePath::root(), &mut errors);
  match value {
    Some(v) if errors.is_empty() => Ok(v),
    _ => Err(errors),
  }
}

fn reify_node(
  schema: &SchemaNode,
  widget: &Widget,
  path: &ValuePath,
  errors: &mut Vec<FieldError>,
) -> Option<Value> {
  match (widget, &schema.kind) {
    (Widget::Raw(text), _) => {
      if text.trim().is_empty() {
        return fail(errors, path, "value is empty");
      }
      match serde_json::from_str(text) {
        Ok(v) => Some(v),
        Err(e) => fail(errors, path, format!("invalid JSON: {e}")),
      }
    }

    (Widget::Choice { options, selected }, kind) => match selected {
      None => fail(errors, path, "no option selected"),
      Some(i) => match options.get(*i) {
        Some(option) => Some(coerce_option(option, kind)),
        None => fail(errors, path, format!("option {i} is out of range")),
      },
    },

    (Widget::Text(s), NodeKind::String(_)) => Some(Value::String(s.clone())),

    (Widget::Numeric(text), NodeKind::Integer(_)) => {
      let text = text.trim();
      if text.is_empty() {
        return fail(errors, path, "value is empty");
      }
      if let Ok(n) = text.parse::<i64>() {
        Some(Value::from(n))
      } else if let Ok(n) = text.parse::<u64>() {
        Some(Value::from(n))
      } else {
        // `5.0` is an integer too; keep its float form.
        match Number::from_str(text) {
          Ok(n) if n.as_f64().is_some_and(|f| f.fract() == 0.0) => Some(Value::Number(n)),
          _ => fail(errors, path, format!("{text:?} is not an integer")),
        }
      }
    }
    (Widget::Numeric(text), NodeKind::Number(_)) => {
      let text = text.trim();
      if text.is_empty() {
        return fail(errors, path, "value is empty");
      }
      match Number::from_str(text) {
        Ok(n) => Some(Value::Number(n)),
        Err(_) => fail(errors, path, format!("{text:?} is not a number")),
      }
    }

    (Widget::Toggle(b), NodeKind::Boolean) => Some(Value::Bool(*b)),

    (Widget::Group(fields), NodeKind::Object(obj)) => {
      let mut map = Map::new();
      let mut complete = true;
      for field in fields {
        let field_path = path.key(&field.name);
        if !field.present {
          if field.required {
            errors.push(FieldError::new(&field_path, "required field is empty"));
            complete = false;
          }
          continue;
        }
        let any = SchemaNode::any();
        let sub = if field.declared {
          obj.property(&field.name).unwrap_or(&any)
        } else {
          match &obj.additional {
            AdditionalProperties::Schema(sub) => sub,
            AdditionalProperties::Allowed | AdditionalProperties::Forbidden => &any,
          }
        };
        match reify_node(sub, &field.widget, &field_path, errors) {
          Some(v) => {
            map.insert(field.name.clone(), v);
          }
          None => complete = false,
        }
      }
      complete.then_some(Value::Object(map))
    }

    (Widget::List(items), NodeKind::Array(arr)) => {
      let any = SchemaNode::any();
      let sub = arr.items.as_deref().unwrap_or(&any);
      let mut out = Vec::with_capacity(items.len());
      for (i, item) in items.iter().enumerate() {
        if let Some(v) = reify_node(sub, item, &path.index(i), errors) {
          out.push(v);
        }
      }
      (out.len() == items.len()).then_some(Value::Array(out))
    }

    (widget, _) => fail(errors, path, format!(
      "{} widget does not fit a {} node",
      widget_name(widget),
      schema.type_name()
    )),
  }
}

fn fail(errors: &mut Vec<FieldError>, path: &ValuePath, message: impl Into<String>) -> Option<Value> {
  errors.push(FieldError::new(path, message));
  None
}

/// Enum options are emitted with the node's declared scalar type.
fn coerce_option(option: &Value, kind: &NodeKind) -> Value {
  match (kind, option) {
    (NodeKind::String(_), Value::String(_)) => option.clone(),
    (NodeKind::String(_), other) => Value::String(other.to_string()),
    (NodeKind::Integer(_), Value::String(s)) => s
      .trim()
      .parse::<i64>()
      .map(Value::from)
      .unwrap_or_else(|_| option.clone()),
    (NodeKind::Number(_), Value::String(s)) => Number::from_str(s.trim())
      .map(Value::Number)
      .unwrap_or_else(|_| option.clone()),
    (NodeKind::Boolean, Value::String(s)) => match s.as_str() {
      "true" => Value::Bool(true),
      "false" => Value::Bool(false),
      _ => option.clone(),
    },
    _ => option.clone(),
  }
}

fn widget_name(widget: &Widget) -> &'static str {
  match widget {
    Widget::Text(_) => "text",
    Widget::Numeric(_) => "numeric",
    Widget::Toggle(_) => "toggle",
    Widget::Choice { .. } => "choice",
    Widget::Group(_) => "group",
    Widget::List(_) => "list",
    Widget::Raw(_) => "raw",
  }
}

/// The schema node governing the widget at `path`.
pub fn schema_at<'a>(
  schema: &'a SchemaNode,
  widget: &Widget,
  path: &ValuePath,
) -> Option<&'a SchemaNode> {
  let mut node = schema;
  let mut current = widget;
  for seg in path.segments() {
    match (current, &node.kind, seg) {
      (Widget::Group(fields), NodeKind::Object(obj), Segment::Key(k)) => {
        let field = fields.iter().find(|f| &f.name == k)?;
        node = if field.declared {
          obj.property(k)?
        } else {
          match &obj.additional {
            AdditionalProperties::Schema(sub) => sub,
            _ => return None,
          }
        };
        current = &field.widget;
      }
      (Widget::List(items), NodeKind::Array(arr), Segment::Index(i)) => {
        node = arr.items.as_deref()?;
        current = items.get(*i)?;
      }
      _ => return None,
    }
  }
  Some(node)
}

// ─── Editing state ───────────────────────────────────────────────────────────

/// A single user edit addressed to the widget at some path.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
  /// Replace the text of a text, numeric or raw widget.
  SetText(String),
  /// Pick an enum option by index.
  Select(usize),
  SetBool(bool),
  /// Include or omit an optional field. Only valid on field paths.
  SetPresent(bool),
  /// Append a freshly projected element to a list.
  AppendItem,
  RemoveItem(usize),
}

/// Which representation is being edited.
#[derive(Debug, Clone, PartialEq)]
pub enum EditMode {
  Form(Widget),
  Raw(String),
}

/// Immutable editing state for one value under one schema.
#[derive(Debug, Clone)]
pub struct FormState {
  schema: Arc<SchemaNode>,
  mode:   EditMode,
}

impl FormState {
  /// Start in form mode, projected from `value` (or empty).
  pub fn new(schema: SchemaNode, value: Option<&Value>) -> Self {
    let widget = project(&schema, value);
    Self { schema: Arc::new(schema), mode: EditMode::Form(widget) }
  }

  pub fn schema(&self) -> &SchemaNode { &self.schema }

  pub fn mode(&self) -> &EditMode { &self.mode }

  pub fn is_raw(&self) -> bool { matches!(self.mode, EditMode::Raw(_)) }

  /// The value the current state represents.
  pub fn value(&self) -> Result<Value, Vec<FieldError>> {
    match &self.mode {
      EditMode::Form(widget) => reify(&self.schema, widget),
      EditMode::Raw(text) => serde_json::from_str(text).map_err(|e| {
        vec![FieldError::new(&ValuePath::root(), format!("invalid JSON: {e}"))]
      }),
    }
  }

  /// Switch to the other mode. Fails, leaving `self` untouched, when the
  /// current representation does not convert.
  pub fn toggle_mode(&self) -> Result<Self, Vec<FieldError>> {
    let value = self.value()?;
    let mode = match &self.mode {
      EditMode::Form(_) => EditMode::Raw(
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
      ),
      EditMode::Raw(_) => EditMode::Form(project(&self.schema, Some(&value))),
    };
    Ok(Self { schema: Arc::clone(&self.schema), mode })
  }

  /// Replace the raw text. Only valid in raw mode.
  pub fn with_raw_text(&self, text: impl Into<String>) -> Result<Self, FieldError> {
    match self.mode {
      EditMode::Raw(_) => Ok(Self {
        schema: Arc::clone(&self.schema),
        mode:   EditMode::Raw(text.into()),
      }),
      EditMode::Form(_) => Err(FieldError::new(
        &ValuePath::root(),
        "raw text can only be edited in raw mode",
      )),
    }
  }

  /// Apply `edit` to the widget at `path`. Only valid in form mode.
  pub fn apply(&self, path: &ValuePath, edit: Edit) -> Result<Self, FieldError> {
    let EditMode::Form(widget) = &self.mode else {
      return Err(FieldError::new(path, "form edits are not possible in raw mode"));
    };
    let mut widget = widget.clone();
    edit_widget(&mut widget, &self.schema, path.segments(), &ValuePath::root(), &edit)?;
    Ok(Self { schema: Arc::clone(&self.schema), mode: EditMode::Form(widget) })
  }
}

fn edit_widget(
  widget: &mut Widget,
  schema: &SchemaNode,
  rest: &[Segment],
  here: &ValuePath,
  edit: &Edit,
) -> Result<(), FieldError> {
  let Some((seg, tail)) = rest.split_first() else {
    return edit_leaf(widget, schema, here, edit);
  };

  match (widget, &schema.kind, seg) {
    (Widget::Group(fields), NodeKind::Object(obj), Segment::Key(name)) => {
      let here = here.key(name);
      let field = fields
        .iter_mut()
        .find(|f| &f.name == name)
        .ok_or_else(|| FieldError::new(&here, "no such field"))?;

      if tail.is_empty()
        && let Edit::SetPresent(present) = edit
      {
        if !present && field.required {
          return Err(FieldError::new(&here, "a required field cannot be omitted"));
        }
        field.present = *present;
        return Ok(());
      }

      let any = SchemaNode::any();
      let sub = if field.declared {
        obj.property(name).unwrap_or(&any)
      } else {
        match &obj.additional {
          AdditionalProperties::Schema(sub) => sub,
          AdditionalProperties::Allowed | AdditionalProperties::Forbidden => &any,
        }
      };
      edit_widget(&mut field.widget, sub, tail, &here, edit)?;
      field.present = true;
      Ok(())
    }
    (Widget::List(items), NodeKind::Array(arr), Segment::Index(i)) => {
      let here = here.index(*i);
      let item = items
        .get_mut(*i)
        .ok_or_else(|| FieldError::new(&here, "no such element"))?;
      let any = SchemaNode::any();
      edit_widget(item, arr.items.as_deref().unwrap_or(&any), tail, &here, edit)
    }
    _ => Err(FieldError::new(here, format!("cannot descend into {seg:?} here"))),
  }
}

fn edit_leaf(
  widget: &mut Widget,
  schema: &SchemaNode,
  here: &ValuePath,
  edit: &Edit,
) -> Result<(), FieldError> {
  match (widget, edit) {
    (Widget::Text(s) | Widget::Numeric(s) | Widget::Raw(s), Edit::SetText(text)) => {
      *s = text.clone();
    }
    (Widget::Choice { options, selected }, Edit::Select(i)) => {
      if *i >= options.len() {
        return Err(FieldError::new(here, format!("option {i} is out of range")));
      }
      *selected = Some(*i);
    }
    (Widget::Toggle(b), Edit::SetBool(v)) => *b = *v,
    (Widget::List(items), Edit::AppendItem) => {
      let item = match &schema.kind {
        NodeKind::Array(arr) => match &arr.items {
          Some(sub) => project(sub, None),
          None => Widget::Raw(String::new()),
        },
        _ => return Err(FieldError::new(here, "list does not belong to an array node")),
      };
      items.push(item);
    }
    (Widget::List(items), Edit::RemoveItem(i)) => {
      if *i >= items.len() {
        return Err(FieldError::new(here, format!("element {i} does not exist")));
      }
      items.remove(*i);
    }
    (_, Edit::SetPresent(_)) => {
      return Err(FieldError::new(here, "only object fields can be omitted"));
    }
    (widget, edit) => {
      return Err(FieldError::new(
        here,
        format!("{edit:?} does not apply to a {} widget", widget_name(widget)),
      ));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::validate::validate;

  fn schema(doc: Value) -> SchemaNode { SchemaNode::parse(&doc).unwrap() }

  fn assert_round_trip(doc: Value, value: Value) {
    assert!(validate(&value, &doc).unwrap().is_accepted(), "fixture must validate: {value}");
    let s = schema(doc);
    let widget = project(&s, Some(&value));
    assert_eq!(reify(&s, &widget), Ok(value));
  }

  fn usecases_schema() -> Value {
    json!({
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "usecase_id": { "type": "string" },
          "status": { "type": "string", "enum": ["active", "inactive"] }
        },
        "required": ["usecase_id", "status"]
      }
    })
  }

  #[test]
  fn round_trips_reference_table() {
    assert_round_trip(
      usecases_schema(),
      json!([
        { "usecase_id": "UC001", "status": "active" },
        { "usecase_id": "UC002", "status": "inactive" }
      ]),
    );
  }

  #[test]
  fn round_trips_optional_and_extra_properties() {
    let doc = json!({
      "type": "object",
      "required": ["host"],
      "properties": {
        "host": { "type": "string" },
        "port": { "type": "integer" },
        "ratio": { "type": "number" },
        "debug": { "type": "boolean" },
        "label": { "type": "string" }
      }
    });
    assert_round_trip(doc.clone(), json!({ "host": "db", "port": 5432 }));
    assert_round_trip(
      doc.clone(),
      json!({ "host": "", "ratio": 0.25, "debug": false, "label": "", "extra": { "a": [1, 2.5] } }),
    );
    assert_round_trip(doc, json!({ "host": "h", "ratio": 3 }));
  }

  #[test]
  fn round_trips_nested_and_untyped_nodes() {
    let doc = json!({
      "type": "object",
      "properties": {
        "limits": {
          "type": "object",
          "additionalProperties": { "type": "integer" }
        },
        "matrix": { "type": "array", "items": { "type": "array", "items": { "type": "number" } } },
        "blob": {},
        "nothing": { "type": "null" },
        "free": { "type": "array" }
      }
    });
    assert_round_trip(
      doc,
      json!({
        "limits": { "cpu": 2, "mem": 1024 },
        "matrix": [[1.5, 2], [], [1e300]],
        "blob": { "nested": [true, null, "x"] },
        "nothing": null,
        "free": [1, "two", { "three": 3 }]
      }),
    );
  }

  #[test]
  fn round_trips_big_unsigned_integers() {
    assert_round_trip(json!({ "type": "integer" }), json!(u64::MAX));
    assert_round_trip(json!({ "type": "integer" }), json!(-42));
    assert_round_trip(json!({ "type": "integer" }), json!(5.0));
  }

  #[test]
  fn enum_takes_precedence_over_type() {
    let s = schema(json!({ "type": "integer", "enum": [1, 2, 3] }));
    let widget = project(&s, Some(&json!(2)));
    assert_eq!(
      widget,
      Widget::Choice { options: vec![json!(1), json!(2), json!(3)], selected: Some(1) }
    );
  }

  #[test]
  fn enum_options_are_coerced_to_declared_type() {
    let s = schema(json!({ "type": "integer", "enum": ["1", "2"] }));
    let widget = Widget::Choice { options: vec![json!("1"), json!("2")], selected: Some(1) };
    assert_eq!(reify(&s, &widget), Ok(json!(2)));
  }

  #[test]
  fn fresh_object_projection_marks_fields() {
    let s = schema(json!({
      "type": "object",
      "required": ["name", "tags"],
      "properties": {
        "name": { "type": "string" },
        "tags": { "type": "array", "items": { "type": "string" } },
        "mode": { "type": "string", "default": "fast" },
        "note": { "type": "string" }
      }
    }));
    let Widget::Group(fields) = project(&s, None) else { panic!("expected group") };
    let flags: Vec<_> =
      fields.iter().map(|f| (f.name.as_str(), f.required, f.present)).collect();
    assert_eq!(
      flags,
      [("name", true, false), ("tags", true, true), ("mode", false, true), ("note", false, false)]
    );
    assert_eq!(fields[2].widget, Widget::Text("fast".into()));
  }

  #[test]
  fn reify_collects_every_field_error() {
    let s = schema(json!({
      "type": "object",
      "required": ["name"],
      "properties": {
        "name": { "type": "string" },
        "port": { "type": "integer" },
        "ratio": { "type": "number" }
      }
    }));
    let widget = Widget::Group(vec![
      Field {
        name: "name".into(),
        required: true,
        declared: true,
        present: false,
        widget: Widget::Text(String::new()),
      },
      Field {
        name: "port".into(),
        required: false,
        declared: true,
        present: true,
        widget: Widget::Numeric("80a".into()),
      },
      Field {
        name: "ratio".into(),
        required: false,
        declared: true,
        present: true,
        widget: Widget::Numeric("half".into()),
      },
    ]);
    let errors = reify(&s, &widget).unwrap_err();
    let paths: Vec<String> = errors.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(paths, ["name", "port", "ratio"]);
    assert!(errors[1].message.contains("not an integer"));
  }

  #[test]
  fn invalid_raw_json_blocks_reification() {
    let s = schema(json!({ "type": "object", "properties": { "blob": {} } }));
    let state = FormState::new(s, Some(&json!({ "blob": [1] })));
    let path = ValuePath::root().key("blob");
    let edited = state.apply(&path, Edit::SetText("[1,".into())).unwrap();
    let errors = edited.value().unwrap_err();
    assert_eq!(errors[0].path, path);
    assert!(errors[0].message.starts_with("invalid JSON"));
  }

  #[test]
  fn edits_produce_new_states_and_mark_presence() {
    let s = schema(json!({
      "type": "object",
      "required": ["name"],
      "properties": {
        "name": { "type": "string" },
        "status": { "type": "string", "enum": ["active", "inactive"] },
        "enabled": { "type": "boolean" },
        "hosts": { "type": "array", "items": { "type": "string" } }
      }
    }));
    let empty = FormState::new(s, None);
    assert!(empty.value().is_err());

    let state = empty
      .apply(&ValuePath::root().key("name"), Edit::SetText("svc".into()))
      .and_then(|st| st.apply(&ValuePath::root().key("status"), Edit::Select(1)))
      .and_then(|st| st.apply(&ValuePath::root().key("enabled"), Edit::SetBool(true)))
      .and_then(|st| st.apply(&ValuePath::root().key("hosts"), Edit::AppendItem))
      .and_then(|st| st.apply(&ValuePath::root().key("hosts"), Edit::AppendItem))
      .and_then(|st| {
        st.apply(&ValuePath::root().key("hosts").index(0), Edit::SetText("a".into()))
      })
      .and_then(|st| {
        st.apply(&ValuePath::root().key("hosts").index(1), Edit::SetText("b".into()))
      })
      .unwrap();

    assert_eq!(
      state.value().unwrap(),
      json!({ "name": "svc", "status": "inactive", "enabled": true, "hosts": ["a", "b"] })
    );
    // The starting state is untouched.
    assert!(empty.value().is_err());

    let fewer = state
      .apply(&ValuePath::root().key("hosts"), Edit::RemoveItem(0))
      .and_then(|st| st.apply(&ValuePath::root().key("enabled"), Edit::SetPresent(false)))
      .unwrap();
    assert_eq!(
      fewer.value().unwrap(),
      json!({ "name": "svc", "status": "inactive", "hosts": ["b"] })
    );
    assert!(fewer.apply(&ValuePath::root().key("name"), Edit::SetPresent(false)).is_err());
  }

  #[test]
  fn mode_toggle_is_lossless() {
    let s = schema(usecases_schema());
    let value = json!([{ "usecase_id": "UC001", "status": "active", "owner": "ops" }]);
    let form = FormState::new(s, Some(&value));

    let raw = form.toggle_mode().unwrap();
    assert!(raw.is_raw());
    assert_eq!(raw.value().unwrap(), value);

    let edited = raw
      .with_raw_text(r#"[{"usecase_id":"UC002","status":"inactive"}]"#)
      .unwrap();
    let back = edited.toggle_mode().unwrap();
    assert!(!back.is_raw());
    assert_eq!(back.value().unwrap(), json!([{ "usecase_id": "UC002", "status": "inactive" }]));
  }

  #[test]
  fn toggle_refuses_broken_raw_text() {
    let s = schema(json!({ "type": "object" }));
    let raw = FormState::new(s, Some(&json!({}))).toggle_mode().unwrap();
    let broken = raw.with_raw_text("{").unwrap();
    assert!(broken.toggle_mode().is_err());
    assert!(broken.is_raw());
  }

  #[test]
  fn value_outside_its_node_falls_back_to_raw() {
    let s = schema(json!({ "type": "object", "properties": { "port": { "type": "integer" } } }));
    let widget = project(&s, Some(&json!({ "port": "eighty" })));
    let Widget::Group(fields) = &widget else { panic!() };
    assert_eq!(fields[0].widget, Widget::Raw("\"eighty\"".into()));
  }

  #[test]
  fn schema_at_follows_widget_paths() {
    let s = schema(usecases_schema());
    let widget = project(&s, Some(&json!([{ "usecase_id": "UC001", "status": "active" }])));
    let node = schema_at(&s, &widget, &ValuePath::root().index(0).key("status")).unwrap();
    assert!(node.keywords.enum_values.is_some());
    assert!(schema_at(&s, &widget, &ValuePath::root().index(3)).is_none());
  }

  // ── Round-trip law over generated schemas ─────────────────────────────────

  mod generated {
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    use super::super::{project, reify};
    use crate::{node::SchemaNode, validate::validate};

    /// Floats with a short exact decimal form.
    fn float() -> impl Strategy<Value = Value> {
      (-4096i32..4096).prop_map(|n| json!(f64::from(n) / 8.0))
    }

    fn any_value() -> impl Strategy<Value = Value> {
      let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        float(),
        "[a-z ]{0,6}".prop_map(Value::String),
      ];
      leaf.prop_recursive(2, 12, 3, |inner| {
        prop_oneof![
          prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
          prop::collection::btree_map("[a-z]{1,4}", inner, 0..3)
            .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
      })
    }

    fn schema_doc() -> impl Strategy<Value = Value> {
      let leaf = prop_oneof![
        Just(json!({ "type": "string" })),
        Just(json!({ "type": "integer" })),
        Just(json!({ "type": "number" })),
        Just(json!({ "type": "boolean" })),
        Just(json!({ "type": "null" })),
        Just(json!({})),
        prop::collection::vec("[a-z]{1,5}", 1..4)
          .prop_map(|options| json!({ "type": "string", "enum": options })),
      ];
      leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
          prop::collection::btree_map("[a-z]{1,6}", (inner.clone(), any::<bool>()), 0..4)
            .prop_map(|props| {
              let required: Vec<String> =
                props.iter().filter(|(_, (_, req))| *req).map(|(k, _)| k.clone()).collect();
              let properties: Map<String, Value> =
                props.into_iter().map(|(k, (sub, _))| (k, sub)).collect();
              json!({ "type": "object", "properties": properties, "required": required })
            }),
          inner.prop_map(|items| json!({ "type": "array", "items": items })),
        ]
      })
    }

    /// Values the validator accepts under `doc`. Optional properties are
    /// sometimes left out and undeclared keys sometimes added.
    fn value_for(doc: &Value) -> BoxedStrategy<Value> {
      if let Some(options) = doc.get("enum").and_then(Value::as_array) {
        return prop::sample::select(options.clone()).boxed();
      }
      match doc.get("type").and_then(Value::as_str) {
        Some("string") => "\\PC{0,8}".prop_map(Value::String).boxed(),
        Some("integer") => any::<i64>().prop_map(Value::from).boxed(),
        Some("number") => float().boxed(),
        Some("boolean") => any::<bool>().prop_map(Value::Bool).boxed(),
        Some("null") => Just(Value::Null).boxed(),
        Some("array") => {
          prop::collection::vec(value_for(&doc["items"]), 0..4).prop_map(Value::Array).boxed()
        }
        Some("object") => {
          let required: Vec<&str> = doc["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
          let fields: Vec<BoxedStrategy<(String, Option<Value>)>> = doc["properties"]
            .as_object()
            .map(|props| {
              props
                .iter()
                .map(|(name, sub)| {
                  let name = name.clone();
                  if required.contains(&name.as_str()) {
                    value_for(sub).prop_map(move |v| (name.clone(), Some(v))).boxed()
                  } else {
                    prop::option::of(value_for(sub)).prop_map(move |v| (name.clone(), v)).boxed()
                  }
                })
                .collect()
            })
            .unwrap_or_default();
          let extra = prop::collection::btree_map("X[a-z]{1,4}", any_value(), 0..2);
          (fields, extra)
            .prop_map(|(fields, extra)| {
              let mut map: Map<String, Value> =
                fields.into_iter().filter_map(|(k, v)| Some((k, v?))).collect();
              map.extend(extra);
              Value::Object(map)
            })
            .boxed()
        }
        _ => any_value().boxed(),
      }
    }

    fn schema_and_value() -> impl Strategy<Value = (Value, Value)> {
      schema_doc().prop_flat_map(|doc| {
        let values = value_for(&doc);
        (Just(doc), values)
      })
    }

    proptest! {
      #[test]
      fn reify_inverts_project((doc, value) in schema_and_value()) {
        prop_assert!(validate(&value, &doc).unwrap().is_accepted(), "{value} under {doc}");
        let node = SchemaNode::parse(&doc).unwrap();
        let widget = project(&node, Some(&value));
        prop_assert_eq!(reify(&node, &widget), Ok(value));
      }
    }
  }
}
