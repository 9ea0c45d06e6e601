//! Sortable, column-configurable table over one fetched listing.

use std::cell::Cell as FlagCell;
use std::rc::Rc;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState as SelectionState};
use tracing::debug;

use crate::fetch::{ResourceFetchState, ResourceItem};
use crate::persist::{PersistedScalar, Storage};
use crate::store::Subscription;
use crate::table::params::{
  param_name, parse_columns_param, parse_sort_param, serialize_columns_param,
  serialize_sort_param, ParamKind,
};
use crate::table::{ColumnDef, SortEntry, TableState};
use crate::ui::components::KeyResult;
use crate::ui::renderfns::{state_color, truncate};

/// Visible columns and sort chain of one listing, persisted under
/// `table.<name>.cols` and `table.<name>.sort`.
pub struct TablePrefs {
  columns: PersistedScalar<Option<Vec<String>>>,
  sort: PersistedScalar<Vec<SortEntry>>,
  dirty: Rc<FlagCell<bool>>,
  _subscriptions: [Subscription; 2],
}

impl TablePrefs {
  pub fn new(storage: &Storage, name: &str) -> Self {
    let prefix = format!("table.{}", name);
    let columns = PersistedScalar::new(
      storage,
      param_name(ParamKind::Columns, Some(&prefix)),
      None,
      |raw| Some(parse_columns_param(Some(raw))),
      |ids: &Option<Vec<String>>| serialize_columns_param(ids.as_deref()),
    );
    let sort = PersistedScalar::new(
      storage,
      param_name(ParamKind::Sort, Some(&prefix)),
      Vec::new(),
      |raw| Some(parse_sort_param(Some(raw))),
      |chain: &Vec<SortEntry>| serialize_sort_param(chain),
    );

    let dirty = Rc::new(FlagCell::new(false));
    let on_columns = Rc::clone(&dirty);
    let on_sort = Rc::clone(&dirty);
    let subscriptions = [
      columns.subscribe(move || on_columns.set(true)),
      sort.subscribe(move || on_sort.set(true)),
    ];

    Self {
      columns,
      sort,
      dirty,
      _subscriptions: subscriptions,
    }
  }

  pub fn columns_key(&self) -> &str {
    self.columns.key()
  }

  pub fn sort_key(&self) -> &str {
    self.sort.key()
  }

  /// True once after any write to either key, ours or another process's.
  fn take_dirty(&self) -> bool {
    self.dirty.replace(false)
  }
}

/// Outcome of a key the table consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEvent {
  SelectionChanged,
}

pub struct ResourceTable<T> {
  state: TableState<T>,
  prefs: TablePrefs,
  data: Option<Arc<Vec<T>>>,
  rows: Vec<T>,
  selection: SelectionState,
  focus: usize,
}

impl<T: Clone + 'static> ResourceTable<T> {
  pub fn new(columns: Vec<ColumnDef<T>>, prefs: TablePrefs) -> Self {
    let mut table = Self {
      state: TableState::new(columns),
      prefs,
      data: None,
      rows: Vec::new(),
      selection: SelectionState::default(),
      focus: 0,
    };
    table.load_prefs();
    table
  }

  pub fn state(&self) -> &TableState<T> {
    &self.state
  }

  /// Rows in display order.
  pub fn rows(&self) -> &[T] {
    &self.rows
  }

  pub fn selected_row(&self) -> Option<&T> {
    self.selection.selected().and_then(|i| self.rows.get(i))
  }

  pub fn focused_column(&self) -> Option<&ColumnDef<T>> {
    self.state.visible_columns().get(self.focus).copied()
  }

  /// Replace the listing's data, keeping the current sort.
  pub fn set_data(&mut self, data: Option<Arc<Vec<T>>>) {
    self.data = data;
    self.resort();
  }

  /// Apply command-line overrides and persist them.
  pub fn apply_overrides(&mut self, columns: Option<Vec<String>>, sort: Option<Vec<SortEntry>>) {
    if let Some(columns) = columns {
      self.state.set_column_order(Some(columns));
    }
    if let Some(sort) = sort {
      self.state.set_sort(sort);
    }
    self.save_prefs();
    self.resort();
  }

  /// Forget persisted preferences and show defaults.
  pub fn reset(&mut self) {
    self.state.set_column_order(None);
    self.state.clear_sort();
    self.save_prefs();
    self.resort();
  }

  /// Pick up preference changes made through other bindings or processes.
  pub fn sync_prefs(&mut self) {
    if self.prefs.take_dirty() {
      self.load_prefs();
    }
  }

  fn load_prefs(&mut self) {
    self.state.set_column_order(self.prefs.columns.get());
    self.state.set_sort(self.prefs.sort.get());
    self.prefs.take_dirty();
    self.resort();
  }

  fn save_prefs(&mut self) {
    let columns = self.state.visible_ids().map(|ids| ids.to_vec());
    self.prefs.columns.set(&columns);
    self.prefs.sort.set(&self.state.sort_entries().to_vec());
    // Our own writes are already applied
    self.prefs.take_dirty();
  }

  fn resort(&mut self) {
    self.rows = self
      .state
      .sorted_data(self.data.as_deref().map(Vec::as_slice))
      .unwrap_or_default();

    let visible = self.state.visible_columns().len();
    self.focus = self.focus.min(visible.saturating_sub(1));

    match (self.rows.len(), self.selection.selected()) {
      (0, _) => self.selection.select(None),
      (len, Some(i)) if i >= len => self.selection.select(Some(len - 1)),
      (_, None) => self.selection.select(Some(0)),
      _ => {}
    }
  }

  fn toggle_column_at(&mut self, index: usize) {
    let Some(id) = self.state.columns().get(index).map(|c| c.id().to_string()) else {
      return;
    };
    let hiding_last = self.state.visible_columns().len() == 1
      && self.state.visible_columns().first().is_some_and(|c| c.id() == id);
    if hiding_last {
      debug!(column = %id, "refusing to hide the last visible column");
      return;
    }
    self.state.toggle_column(&id);
    self.save_prefs();
    self.resort();
  }

  fn sort_focused(&mut self, multi: bool) {
    let Some(id) = self.focused_column().map(|c| c.id().to_string()) else {
      return;
    };
    self.state.toggle_sort(&id, multi);
    self.save_prefs();
    self.resort();
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<TableEvent> {
    let before = self.selection.selected();
    let last = self.rows.len().checked_sub(1);
    match key.code {
      KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('k') | KeyCode::Up
      | KeyCode::Char('g') | KeyCode::Home | KeyCode::Char('G') | KeyCode::End
        if last.is_none() => {}
      KeyCode::Char('j') | KeyCode::Down => {
        self.selection.select_next();
        self.clamp_selection();
      }
      KeyCode::Char('k') | KeyCode::Up => self.selection.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.selection.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.selection.select(last),
      KeyCode::Char('h') | KeyCode::Left => self.focus = self.focus.saturating_sub(1),
      KeyCode::Char('l') | KeyCode::Right => {
        let visible = self.state.visible_columns().len();
        self.focus = (self.focus + 1).min(visible.saturating_sub(1));
      }
      KeyCode::Char('s') => self.sort_focused(false),
      KeyCode::Char('S') => self.sort_focused(true),
      KeyCode::Char('x') => {
        self.state.clear_sort();
        self.save_prefs();
        self.resort();
      }
      KeyCode::Char('0') => {
        self.state.set_column_order(None);
        self.save_prefs();
        self.resort();
      }
      KeyCode::Char(c @ '1'..='9') => {
        let index = c as usize - '1' as usize;
        self.toggle_column_at(index);
      }
      _ => return KeyResult::NotHandled,
    }

    if self.selection.selected() != before {
      KeyResult::Event(TableEvent::SelectionChanged)
    } else {
      KeyResult::Handled
    }
  }

  fn clamp_selection(&mut self) {
    if let Some(i) = self.selection.selected() {
      if i >= self.rows.len() {
        self.selection.select(Some(self.rows.len().saturating_sub(1)));
      }
    }
  }

  /// Header labels with sort arrows, plus chain positions when more than
  /// one column sorts.
  pub fn header_labels(&self) -> Vec<String> {
    let multi = self.state.sort_entries().len() > 1;
    self
      .state
      .visible_columns()
      .iter()
      .map(|col| match self.state.sort_position(col.id()) {
        Some((pos, direction)) if multi => {
          format!("{} {}{}", col.header(), direction.arrow(), pos + 1)
        }
        Some((_, direction)) => format!("{} {}", col.header(), direction.arrow()),
        None => col.header().to_string(),
      })
      .collect()
  }

  pub fn render(&mut self, frame: &mut Frame, area: Rect, title: &str, item: &ResourceItem<Vec<T>>) {
    let block = Block::default()
      .title(format!(" {} ", title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(inner);

    let toolbar = toolbar_line(item, self.rows.len(), self.state.sort_entries());
    frame.render_widget(Paragraph::new(toolbar), chunks[0]);

    let columns = self.state.visible_columns();
    if self.rows.is_empty() {
      let message = match item.state {
        ResourceFetchState::Loading => "Loading...",
        ResourceFetchState::Error => "Failed to load. Press 'r' to retry.",
        _ => "Nothing to show.",
      };
      let paragraph = Paragraph::new(message).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[1]);
      return;
    }

    let header = Row::new(
      self
        .header_labels()
        .into_iter()
        .zip(columns.iter())
        .enumerate()
        .map(|(i, (label, col))| {
          let mut style = col.header_style().add_modifier(Modifier::BOLD);
          if i == self.focus {
            style = style.add_modifier(Modifier::REVERSED);
          }
          Cell::from(label).style(style)
        }),
    )
    .style(Style::default().fg(Color::Yellow));

    let rows = self
      .rows
      .iter()
      .map(|row| Row::new(columns.iter().map(|col| col.render_cell(row))));
    let widths: Vec<Constraint> = columns.iter().map(|col| col.width_constraint()).collect();

    let table = Table::new(rows, widths)
      .header(header)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, chunks[1], &mut self.selection);
  }
}

/// One-line status: fetch state, row count and active sort.
pub fn toolbar_line<T>(item: &ResourceItem<T>, rows: usize, sort: &[SortEntry]) -> Line<'static> {
  let status = match (&item.state, &item.error) {
    (ResourceFetchState::Loading, _) => "loading...".to_string(),
    (ResourceFetchState::Error, Some(error)) => format!("error: {}", truncate(&error.message, 60)),
    (ResourceFetchState::Error, None) => "error".to_string(),
    _ => format!("{} rows", rows),
  };

  let mut spans = vec![Span::styled(status, Style::default().fg(state_color(item.state)))];
  if item.state != ResourceFetchState::Success && rows > 0 {
    spans.push(Span::styled(
      format!("  ({} cached rows)", rows),
      Style::default().fg(Color::DarkGray),
    ));
  }
  if !sort.is_empty() {
    let chain: Vec<String> = sort
      .iter()
      .map(|entry| format!("{} {}", entry.column_id, entry.direction.arrow()))
      .collect();
    spans.push(Span::styled(
      format!("  sort: {}", chain.join(", ")),
      Style::default().fg(Color::DarkGray),
    ));
  }
  Line::from(spans)
}
