//! Form pane: the right panel, one line per field of the open entry.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::{
  app::App,
  editor::{Editor, Row},
};

// ─── Public entry ─────────────────────────────────────────────────────────────

/// Render the open entry's form into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App, editor: &Editor) {
  let dirty = if editor.is_dirty() { " *" } else { "" };
  let title = format!(
    " {}  v{}  [{} v{}]{dirty} ",
    app.label(&editor.entry),
    editor.entry.version,
    editor.schema.name,
    editor.schema.version,
  );

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  // Errors take as many lines as they need below the form.
  let error_height = if editor.errors.is_empty() { 0 } else { editor.errors.len() as u16 + 1 };
  let parts = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(0), Constraint::Length(error_height)])
    .split(inner);

  match editor.raw_text() {
    Some(text) => draw_raw(f, parts[0], editor, text),
    None => draw_rows(f, parts[0], editor),
  }
  draw_errors(f, parts[1], editor);
}

// ─── Form mode ────────────────────────────────────────────────────────────────

fn draw_rows(f: &mut Frame, area: Rect, editor: &Editor) {
  let rows = editor.rows();
  if rows.is_empty() {
    let empty = Paragraph::new("No fields.").style(Style::default().fg(Color::DarkGray));
    f.render_widget(empty, area);
    return;
  }

  let label_width = rows
    .iter()
    .map(|r| r.depth * 2 + r.label.chars().count())
    .max()
    .unwrap_or(0)
    .min(32);

  let items: Vec<ListItem> = rows
    .iter()
    .enumerate()
    .map(|(i, row)| {
      let typed = (i == editor.cursor).then_some(editor.input.as_deref()).flatten();
      ListItem::new(row_line(row, label_width, typed))
    })
    .collect();

  let mut state = ListState::default();
  state.select(Some(editor.cursor));

  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    area,
    &mut state,
  );
}

fn row_line(row: &Row, label_width: usize, typed: Option<&str>) -> Line<'static> {
  let label = format!("{}{}", "  ".repeat(row.depth), row.label);
  let marker = match row.field {
    Some(flags) if flags.required => "*",
    Some(flags) if !flags.declared => "+",
    _ => " ",
  };

  let mut spans = vec![
    Span::styled(
      format!("{label:<label_width$}"),
      Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled(format!("{marker} "), Style::default().fg(Color::Yellow)),
  ];

  match typed {
    Some(text) => spans.push(Span::styled(
      format!("{text}_"),
      Style::default().fg(Color::Yellow),
    )),
    None if !row.is_present() => spans.push(Span::styled(
      "(absent)",
      Style::default().fg(Color::DarkGray),
    )),
    None => spans.push(Span::raw(row.kind.display())),
  }

  Line::from(spans)
}

// ─── Raw mode ─────────────────────────────────────────────────────────────────

fn draw_raw(f: &mut Frame, area: Rect, editor: &Editor, text: &str) {
  let (body, style) = match &editor.input {
    Some(typed) => (format!("{typed}_"), Style::default().fg(Color::Yellow)),
    None => (text.to_owned(), Style::default()),
  };
  f.render_widget(
    Paragraph::new(body).style(style).wrap(Wrap { trim: false }),
    area,
  );
}

// ─── Errors ───────────────────────────────────────────────────────────────────

fn draw_errors(f: &mut Frame, area: Rect, editor: &Editor) {
  if editor.errors.is_empty() {
    return;
  }
  let mut lines = vec![Line::from("")];
  lines.extend(
    editor
      .errors
      .iter()
      .map(|e| Line::from(Span::styled(format!("✗ {e}"), Style::default().fg(Color::Red)))),
  );
  f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}
