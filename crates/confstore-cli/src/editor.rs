//! Form editing for one config entry, independent of rendering and I/O.
//!
//! The widget tree held by [`FormState`] is flattened into [`Row`]s that the
//! form pane draws one per line; key handling addresses edits back to the
//! row's [`ValuePath`].

use confstore_core::{
  entry::ConfigEntry,
  form::{Edit, EditMode, Field, FieldError, FormState, Widget},
  path::{Segment, ValuePath},
  schema::SchemaDefinition,
};
use serde_json::Value;

// ─── Rows ─────────────────────────────────────────────────────────────────────

/// Field metadata for rows that are object properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags {
  pub required: bool,
  pub present:  bool,
  pub declared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
  Text(String),
  Numeric(String),
  Toggle(bool),
  Choice { options: Vec<Value>, selected: Option<usize> },
  Group(usize),
  List(usize),
  Raw(String),
}

impl RowKind {
  fn of(widget: &Widget) -> Self {
    match widget {
      Widget::Text(s) => Self::Text(s.clone()),
      Widget::Numeric(s) => Self::Numeric(s.clone()),
      Widget::Toggle(b) => Self::Toggle(*b),
      Widget::Choice { options, selected } => {
        Self::Choice { options: options.clone(), selected: *selected }
      }
      Widget::Group(fields) => Self::Group(fields.len()),
      Widget::List(items) => Self::List(items.len()),
      Widget::Raw(s) => Self::Raw(s.clone()),
    }
  }

  /// Text shown in the value column.
  pub fn display(&self) -> String {
    match self {
      Self::Text(s) | Self::Numeric(s) => s.clone(),
      Self::Raw(s) => s.split_whitespace().collect::<Vec<_>>().join(" "),
      Self::Toggle(b) => if *b { "[x]" } else { "[ ]" }.to_owned(),
      Self::Choice { options, selected } => match selected.and_then(|i| options.get(i)) {
        Some(Value::String(s)) => format!("< {s} >"),
        Some(other) => format!("< {other} >"),
        None => "< none >".to_owned(),
      },
      Self::Group(n) => format!("{{{n} fields}}"),
      Self::List(n) => format!("[{n} items]"),
    }
  }

  fn text(&self) -> Option<&str> {
    match self {
      Self::Text(s) | Self::Numeric(s) | Self::Raw(s) => Some(s),
      _ => None,
    }
  }
}

/// One line of the form.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
  pub path:  ValuePath,
  pub depth: usize,
  pub label: String,
  pub field: Option<FieldFlags>,
  pub kind:  RowKind,
}

impl Row {
  pub fn is_present(&self) -> bool { self.field.is_none_or(|f| f.present) }
}

/// Flatten a widget tree into display rows, depth first. Children of absent
/// fields are not listed.
pub fn flatten(widget: &Widget) -> Vec<Row> {
  let mut rows = Vec::new();
  match widget {
    Widget::Group(fields) => push_fields(&mut rows, fields, &ValuePath::root(), 0),
    other => push_widget(&mut rows, other, ValuePath::root(), 0, "value".to_owned(), None),
  }
  rows
}

fn push_widget(
  rows: &mut Vec<Row>,
  widget: &Widget,
  path: ValuePath,
  depth: usize,
  label: String,
  field: Option<FieldFlags>,
) {
  let expand = field.is_none_or(|f| f.present);
  rows.push(Row { path: path.clone(), depth, label, field, kind: RowKind::of(widget) });
  if !expand {
    return;
  }
  match widget {
    Widget::Group(fields) => push_fields(rows, fields, &path, depth + 1),
    Widget::List(items) => {
      for (i, item) in items.iter().enumerate() {
        push_widget(rows, item, path.index(i), depth + 1, format!("[{i}]"), None);
      }
    }
    _ => {}
  }
}

fn push_fields(rows: &mut Vec<Row>, fields: &[Field], parent: &ValuePath, depth: usize) {
  for f in fields {
    let flags = FieldFlags { required: f.required, present: f.present, declared: f.declared };
    push_widget(rows, &f.widget, parent.key(&f.name), depth, f.name.clone(), Some(flags));
  }
}

// ─── Editor ───────────────────────────────────────────────────────────────────

/// Editing session for one config entry.
pub struct Editor {
  pub entry:  ConfigEntry,
  pub schema: SchemaDefinition,
  pub state:  FormState,
  pub cursor: usize,
  /// Text being typed, while an input is open.
  pub input:  Option<String>,
  /// Problems from the last edit or submit attempt.
  pub errors: Vec<String>,
}

impl Editor {
  pub fn open(entry: ConfigEntry, schema: SchemaDefinition) -> confstore_core::Result<Self> {
    let state = FormState::new(schema.node()?, Some(&entry.value));
    Ok(Self { entry, schema, state, cursor: 0, input: None, errors: Vec::new() })
  }

  pub fn rows(&self) -> Vec<Row> {
    match self.state.mode() {
      EditMode::Form(widget) => flatten(widget),
      EditMode::Raw(_) => Vec::new(),
    }
  }

  pub fn raw_text(&self) -> Option<&str> {
    match self.state.mode() {
      EditMode::Raw(text) => Some(text),
      EditMode::Form(_) => None,
    }
  }

  pub fn current_row(&self) -> Option<Row> { self.rows().into_iter().nth(self.cursor) }

  /// Whether the form differs from the stored value.
  pub fn is_dirty(&self) -> bool { !self.state.value().is_ok_and(|v| v == self.entry.value) }

  // ── State transitions ─────────────────────────────────────────────────────

  fn take(&mut self, next: Result<FormState, FieldError>) {
    match next {
      Ok(state) => {
        self.state = state;
        self.errors.clear();
        self.clamp_cursor();
      }
      Err(e) => self.errors = vec![e.to_string()],
    }
  }

  fn clamp_cursor(&mut self) {
    let len = self.rows().len();
    self.cursor = self.cursor.min(len.saturating_sub(1));
  }

  fn apply(&mut self, path: &ValuePath, edit: Edit) {
    let next = self.state.apply(path, edit);
    self.take(next);
  }

  pub fn move_down(&mut self) {
    if self.cursor + 1 < self.rows().len() {
      self.cursor += 1;
    }
  }

  pub fn move_up(&mut self) { self.cursor = self.cursor.saturating_sub(1); }

  /// Open a text input on the current row, or over the whole raw document.
  pub fn begin_input(&mut self) {
    if let Some(text) = self.raw_text() {
      self.input = Some(text.to_owned());
      return;
    }
    if let Some(row) = self.current_row()
      && let Some(text) = row.kind.text()
    {
      self.input = Some(text.to_owned());
    }
  }

  pub fn cancel_input(&mut self) { self.input = None; }

  pub fn type_char(&mut self, c: char) {
    if let Some(input) = self.input.as_mut() {
      input.push(c);
    }
  }

  pub fn backspace(&mut self) {
    if let Some(input) = self.input.as_mut() {
      input.pop();
    }
  }

  pub fn commit_input(&mut self) {
    let Some(text) = self.input.take() else { return };
    if self.state.is_raw() {
      let next = self.state.with_raw_text(text);
      self.take(next);
    } else if let Some(row) = self.current_row() {
      self.apply(&row.path, Edit::SetText(text));
    }
  }

  /// Flip a toggle, or step a choice by `step` options.
  pub fn cycle(&mut self, step: isize) {
    let Some(row) = self.current_row() else { return };
    match row.kind {
      RowKind::Toggle(b) => self.apply(&row.path, Edit::SetBool(!b)),
      RowKind::Choice { options, selected } if !options.is_empty() => {
        let len = options.len() as isize;
        let next = match selected {
          Some(i) => (i as isize + step).rem_euclid(len),
          None => if step < 0 { len - 1 } else { 0 },
        };
        self.apply(&row.path, Edit::Select(next as usize));
      }
      _ => {}
    }
  }

  /// Include or omit the optional field under the cursor.
  pub fn toggle_presence(&mut self) {
    let Some(row) = self.current_row() else { return };
    match row.field {
      Some(flags) => self.apply(&row.path, Edit::SetPresent(!flags.present)),
      None => self.errors = vec![format!("{} is not an object field", row.label)],
    }
  }

  /// Append to the list under the cursor, or to the list holding it.
  pub fn append_item(&mut self) {
    let Some(row) = self.current_row() else { return };
    let list_path = match (&row.kind, row.path.last()) {
      (RowKind::List(_), _) => row.path.clone(),
      (_, Some(Segment::Index(_))) => match row.path.parent() {
        Some(parent) => parent,
        None => return,
      },
      _ => {
        self.errors = vec![format!("{} is not a list", row.label)];
        return;
      }
    };
    self.apply(&list_path, Edit::AppendItem);
  }

  /// Remove the list element under the cursor.
  pub fn remove_item(&mut self) {
    let Some(row) = self.current_row() else { return };
    match (row.path.last(), row.path.parent()) {
      (Some(Segment::Index(i)), Some(parent)) => self.apply(&parent, Edit::RemoveItem(*i)),
      _ => self.errors = vec![format!("{} is not a list element", row.label)],
    }
  }

  /// Switch between form and raw JSON.
  pub fn toggle_mode(&mut self) {
    match self.state.toggle_mode() {
      Ok(state) => {
        self.state = state;
        self.errors.clear();
        self.cursor = 0;
      }
      Err(errors) => self.errors = errors.iter().map(ToString::to_string).collect(),
    }
  }

  /// The value to send as the entry's next version. When the form does not
  /// reify, the reasons are kept in `errors` instead.
  pub fn submission(&mut self) -> Option<Value> {
    match self.state.value() {
      Ok(value) => Some(value),
      Err(errors) => {
        self.errors = errors.iter().map(ToString::to_string).collect();
        None
      }
    }
  }

  /// The server accepted the submission.
  pub fn saved(&mut self, entry: ConfigEntry) {
    let state = self
      .schema
      .node()
      .map(|node| FormState::new(node, Some(&entry.value)))
      .ok();
    if let Some(state) = state {
      let raw = self.state.is_raw();
      self.state = state;
      if raw {
        self.toggle_mode();
      }
    }
    self.entry = entry;
    self.errors.clear();
    self.clamp_cursor();
  }
}
