//! Column visibility, column order and sort chain for one table.

use super::columns::{ColumnDef, SortDirection, SortEntry};
use super::sort::sort_data;

/// A column together with whether it is currently shown.
#[derive(Debug)]
pub struct ColumnVisibility<'a, T> {
  pub column: &'a ColumnDef<T>,
  pub visible: bool,
}

pub struct TableState<T> {
  columns: Vec<ColumnDef<T>>,
  /// `None` shows every column in declared order.
  visible_ids: Option<Vec<String>>,
  sort: Vec<SortEntry>,
}

impl<T: Clone> TableState<T> {
  pub fn new(columns: Vec<ColumnDef<T>>) -> Self {
    Self {
      columns,
      visible_ids: None,
      sort: Vec::new(),
    }
  }

  pub fn columns(&self) -> &[ColumnDef<T>] {
    &self.columns
  }

  pub fn column(&self, id: &str) -> Option<&ColumnDef<T>> {
    self.columns.iter().find(|col| col.id() == id)
  }

  /// Visible columns in display order. Stored ids that no longer name a
  /// column are dropped.
  pub fn visible_columns(&self) -> Vec<&ColumnDef<T>> {
    match &self.visible_ids {
      None => self.columns.iter().collect(),
      Some(ids) => ids.iter().filter_map(|id| self.column(id)).collect(),
    }
  }

  pub fn all_columns(&self) -> Vec<ColumnVisibility<'_, T>> {
    let visible = self.visible_columns();
    self
      .columns
      .iter()
      .map(|column| ColumnVisibility {
        column,
        visible: visible.iter().any(|v| v.id() == column.id()),
      })
      .collect()
  }

  /// The stored override, `None` when showing the defaults.
  pub fn visible_ids(&self) -> Option<&[String]> {
    self.visible_ids.as_deref()
  }

  pub fn sort_entries(&self) -> &[SortEntry] {
    &self.sort
  }

  /// Position and direction of a column within the sort chain.
  pub fn sort_position(&self, id: &str) -> Option<(usize, SortDirection)> {
    self
      .sort
      .iter()
      .position(|entry| entry.column_id == id)
      .map(|i| (i, self.sort[i].direction))
  }

  pub fn sorted_data(&self, data: Option<&[T]>) -> Option<Vec<T>> {
    data.map(|rows| sort_data(rows, &self.columns, &self.sort))
  }

  pub fn toggle_column(&mut self, id: &str) {
    let mut next: Vec<String> = match &self.visible_ids {
      Some(ids) => ids.clone(),
      None => self.columns.iter().map(|col| col.id().to_string()).collect(),
    };

    if let Some(idx) = next.iter().position(|existing| existing == id) {
      next.remove(idx);
    } else {
      next.push(id.to_string());
    }

    let is_default = next.len() == self.columns.len()
      && next
        .iter()
        .zip(self.columns.iter())
        .all(|(id, col)| id == col.id());

    self.visible_ids = if is_default { None } else { Some(next) };
  }

  /// Replace the visible list. `None` resets to every column.
  pub fn set_column_order(&mut self, ids: Option<Vec<String>>) {
    self.visible_ids = ids;
  }

  /// Advance a column's sort.
  ///
  /// Single mode replaces the chain and cycles asc, desc, off. Multi mode
  /// only edits this column's entry: append asc, flip to desc in place,
  /// then remove. Columns that cannot sort are ignored.
  pub fn toggle_sort(&mut self, id: &str, multi: bool) {
    if !self.column(id).is_some_and(|col| col.is_sortable()) {
      return;
    }

    let existing = self.sort.iter().position(|entry| entry.column_id == id);
    let current = existing.map(|i| self.sort[i].direction);

    if multi {
      match (existing, current) {
        (Some(i), Some(SortDirection::Asc)) => self.sort[i].direction = SortDirection::Desc,
        (Some(i), _) => {
          self.sort.remove(i);
        }
        (None, _) => self.sort.push(SortEntry::asc(id)),
      }
    } else {
      self.sort = match current {
        None => vec![SortEntry::asc(id)],
        Some(SortDirection::Asc) => vec![SortEntry::desc(id)],
        Some(SortDirection::Desc) => Vec::new(),
      };
    }
  }

  pub fn clear_sort(&mut self) {
    self.sort.clear();
  }

  /// Restore a chain, typically one loaded from persisted preferences.
  pub fn set_sort(&mut self, chain: Vec<SortEntry>) {
    self.sort = chain;
  }
}
