//! Application state machine and event dispatcher.

use std::{collections::HashMap, sync::Arc};

use confstore_core::entry::ConfigEntry;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use uuid::Uuid;

use crate::{client::ApiClient, editor::Editor};

/// Upper bound on entries fetched for the list pane.
const LIST_LIMIT: u32 = 500;

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the entry list.
  ConfigList,
  /// Focus on the form for the open entry.
  Form,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Current screen / keyboard focus.
  pub screen: Screen,

  /// Active config entries, as last loaded.
  pub entries: Vec<ConfigEntry>,

  /// Namespace names by id, for labelling entries.
  pub namespaces: HashMap<Uuid, String>,

  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Cursor position within the *filtered* entry list.
  pub list_cursor: usize,

  /// The entry being edited, if any.
  pub editor: Option<Editor>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Shared HTTP client.
  pub client: Arc<ApiClient>,
}

impl App {
  /// Create an [`App`] with an empty entry list.
  pub fn new(client: ApiClient) -> Self {
    Self {
      screen: Screen::ConfigList,
      entries: Vec::new(),
      namespaces: HashMap::new(),
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      editor: None,
      status_msg: String::new(),
      client: Arc::new(client),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch namespaces and entries from the API.
  pub async fn load_entries(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading configs…".into();
    let loaded = async {
      let namespaces = self.client.list_namespaces().await?;
      let entries = self.client.list_configs(LIST_LIMIT).await?;
      anyhow::Ok((namespaces, entries))
    }
    .await;
    match loaded {
      Ok((namespaces, entries)) => {
        self.namespaces = namespaces.into_iter().map(|ns| (ns.id, ns.name)).collect();
        self.entries = entries;
        self.list_cursor = self.list_cursor.min(self.entries.len().saturating_sub(1));
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// `namespace/key` label for an entry.
  pub fn label(&self, entry: &ConfigEntry) -> String {
    match self.namespaces.get(&entry.namespace_id) {
      Some(ns) => format!("{ns}/{}", entry.key),
      None => format!("{}/{}", entry.namespace_id, entry.key),
    }
  }

  // ── Filtered list ─────────────────────────────────────────────────────────

  /// Returns entries whose label matches the current filter query.
  pub fn filtered_entries(&self) -> Vec<&ConfigEntry> {
    if self.filter.is_empty() {
      return self.entries.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    self
      .entries
      .iter()
      .filter(|e| matcher.fuzzy_match(&self.label(e), &self.filter).is_some())
      .collect()
  }

  /// The entry under the list cursor in the filtered view, if any.
  pub fn cursor_entry(&self) -> Option<&ConfigEntry> {
    self.filtered_entries().get(self.list_cursor).copied()
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    // Filter input mode: all printable keys go into the filter string.
    if self.filter_active {
      return self.handle_filter_key(key).await;
    }

    match self.screen {
      Screen::ConfigList => self.handle_list_key(key).await,
      Screen::Form => self.handle_form_key(key).await,
    }
  }

  async fn handle_filter_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        // Immediately open the form if there's exactly one match.
        let only = match self.filtered_entries().as_slice() {
          [one] => Some((*one).clone()),
          _ => None,
        };
        if let Some(entry) = only {
          self.open_editor(entry).await;
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
    Ok(true)
  }

  async fn handle_list_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      // Quit
      KeyCode::Char('q') => return Ok(false),

      // Navigation
      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_entries().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      // Open form
      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(entry) = self.cursor_entry().cloned() {
          self.open_editor(entry).await;
        }
      }

      // Filter
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      // Reload
      KeyCode::Char('r') => {
        // Failures are already reported in the status bar.
        let _ = self.load_entries().await;
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_form_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    let Some(editor) = self.editor.as_mut() else {
      self.screen = Screen::ConfigList;
      return Ok(true);
    };

    // Text input. Raw JSON spans lines, so there Enter is a newline and Esc
    // finishes.
    if editor.input.is_some() {
      let raw = editor.state.is_raw();
      match key.code {
        KeyCode::Esc if raw => editor.commit_input(),
        KeyCode::Esc => editor.cancel_input(),
        KeyCode::Enter if raw => editor.type_char('\n'),
        KeyCode::Enter => editor.commit_input(),
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Char(c) => editor.type_char(c),
        _ => {}
      }
      return Ok(true);
    }

    match key.code {
      KeyCode::Char('q') => return Ok(false),

      // Back to list
      KeyCode::Esc => {
        if editor.is_dirty() {
          self.status_msg = "Discarded unsaved changes".into();
        }
        self.editor = None;
        self.screen = Screen::ConfigList;
      }

      KeyCode::Down | KeyCode::Char('j') => editor.move_down(),
      KeyCode::Up | KeyCode::Char('k') => editor.move_up(),
      KeyCode::Enter | KeyCode::Char('e') => editor.begin_input(),
      KeyCode::Char(' ') | KeyCode::Right | KeyCode::Char('l') => editor.cycle(1),
      KeyCode::Left | KeyCode::Char('h') => editor.cycle(-1),
      KeyCode::Char('p') => editor.toggle_presence(),
      KeyCode::Char('a') => editor.append_item(),
      KeyCode::Char('d') => editor.remove_item(),
      KeyCode::Char('m') => editor.toggle_mode(),
      KeyCode::Char('s') => self.submit().await,

      _ => {}
    }
    Ok(true)
  }

  /// Transition to `Form` for `entry`, loading its schema.
  async fn open_editor(&mut self, entry: ConfigEntry) {
    self.status_msg = "Loading…".into();
    let label = self.label(&entry);
    let schema = match self.client.get_schema(entry.schema_id).await {
      Ok(schema) => schema,
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        return;
      }
    };
    match Editor::open(entry, schema) {
      Ok(editor) => {
        self.editor = Some(editor);
        self.screen = Screen::Form;
        self.status_msg = format!("Editing {label}");
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  /// Reify the form and send it as the entry's next version.
  async fn submit(&mut self) {
    let Some(editor) = self.editor.as_mut() else { return };
    let Some(value) = editor.submission() else {
      self.status_msg = format!("Cannot save: {} problem(s) in the form", editor.errors.len());
      return;
    };

    let id = editor.entry.id;
    match self.client.update_config(id, value, editor.entry.version).await {
      Ok(entry) => {
        self.status_msg = format!("Saved {} v{}", entry.key, entry.version);
        if let Some(slot) = self.entries.iter_mut().find(|e| e.id == id) {
          *slot = entry.clone();
        }
        editor.saved(entry);
      }
      Err(e) => {
        editor.errors = vec![e.to_string()];
        self.status_msg = "Save rejected".into();
      }
    }
  }
}
