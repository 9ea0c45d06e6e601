//! Column descriptors and the sort primitives they expose.

use std::fmt;
use std::rc::Rc;

use ratatui::layout::Constraint;
use ratatui::style::Style;
use ratatui::widgets::Cell;

/// A comparable value extracted from a row. `Null` always sorts last.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
  Number(f64),
  Text(String),
  Null,
}

impl SortValue {
  pub fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }
}

impl From<f64> for SortValue {
  fn from(value: f64) -> Self {
    Self::Number(value)
  }
}

impl From<i64> for SortValue {
  fn from(value: i64) -> Self {
    Self::Number(value as f64)
  }
}

impl From<&str> for SortValue {
  fn from(value: &str) -> Self {
    Self::Text(value.to_string())
  }
}

impl From<String> for SortValue {
  fn from(value: String) -> Self {
    Self::Text(value)
  }
}

impl<V: Into<SortValue>> From<Option<V>> for SortValue {
  fn from(value: Option<V>) -> Self {
    value.map_or(Self::Null, Into::into)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
  Asc,
  Desc,
}

impl SortDirection {
  pub fn arrow(&self) -> &'static str {
    match self {
      Self::Asc => "▲",
      Self::Desc => "▼",
    }
  }
}

/// One link of a sort chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortEntry {
  pub column_id: String,
  pub direction: SortDirection,
}

impl SortEntry {
  pub fn asc(column_id: impl Into<String>) -> Self {
    Self {
      column_id: column_id.into(),
      direction: SortDirection::Asc,
    }
  }

  pub fn desc(column_id: impl Into<String>) -> Self {
    Self {
      column_id: column_id.into(),
      direction: SortDirection::Desc,
    }
  }
}

pub type SortAccessor<T> = Rc<dyn Fn(&T) -> SortValue>;
type ContentRenderer<T> = Rc<dyn Fn(&T) -> String>;
type CellRenderer<T> = Rc<dyn Fn(&T) -> Cell<'static>>;

/// Fields shared by both column kinds.
pub struct ColumnBase<T> {
  id: String,
  header: String,
  header_style: Style,
  width: Constraint,
  sort: Option<SortAccessor<T>>,
}

impl<T> Clone for ColumnBase<T> {
  fn clone(&self) -> Self {
    Self {
      id: self.id.clone(),
      header: self.header.clone(),
      header_style: self.header_style,
      width: self.width,
      sort: self.sort.clone(),
    }
  }
}

/// A column declaration.
///
/// `Content` columns return text and the table wraps it in a cell with the
/// column's cell style. `FullCell` columns build the whole cell themselves.
/// A column is sortable exactly when it carries a sort accessor.
pub enum ColumnDef<T> {
  Content {
    base: ColumnBase<T>,
    render: ContentRenderer<T>,
    cell_style: Style,
  },
  FullCell {
    base: ColumnBase<T>,
    render: CellRenderer<T>,
  },
}

impl<T> Clone for ColumnDef<T> {
  fn clone(&self) -> Self {
    match self {
      Self::Content {
        base,
        render,
        cell_style,
      } => Self::Content {
        base: base.clone(),
        render: Rc::clone(render),
        cell_style: *cell_style,
      },
      Self::FullCell { base, render } => Self::FullCell {
        base: base.clone(),
        render: Rc::clone(render),
      },
    }
  }
}

fn base<T>(id: &str, header: &str) -> ColumnBase<T> {
  ColumnBase {
    id: id.to_string(),
    header: header.to_string(),
    header_style: Style::default(),
    width: Constraint::Fill(1),
    sort: None,
  }
}

impl<T> ColumnDef<T> {
  pub fn content(id: &str, header: &str, render: impl Fn(&T) -> String + 'static) -> Self {
    Self::Content {
      base: base(id, header),
      render: Rc::new(render),
      cell_style: Style::default(),
    }
  }

  pub fn full_cell(
    id: &str,
    header: &str,
    render: impl Fn(&T) -> Cell<'static> + 'static,
  ) -> Self {
    Self::FullCell {
      base: base(id, header),
      render: Rc::new(render),
    }
  }

  /// Opt the column into sorting.
  pub fn sortable(mut self, accessor: impl Fn(&T) -> SortValue + 'static) -> Self {
    self.base_mut().sort = Some(Rc::new(accessor));
    self
  }

  pub fn styled_header(mut self, style: Style) -> Self {
    self.base_mut().header_style = style;
    self
  }

  /// Style for the wrapping cell. Full-cell columns style their own cells.
  pub fn styled_cells(mut self, style: Style) -> Self {
    if let Self::Content { cell_style, .. } = &mut self {
      *cell_style = style;
    }
    self
  }

  pub fn width(mut self, width: Constraint) -> Self {
    self.base_mut().width = width;
    self
  }

  fn base(&self) -> &ColumnBase<T> {
    match self {
      Self::Content { base, .. } | Self::FullCell { base, .. } => base,
    }
  }

  fn base_mut(&mut self) -> &mut ColumnBase<T> {
    match self {
      Self::Content { base, .. } | Self::FullCell { base, .. } => base,
    }
  }

  pub fn id(&self) -> &str {
    &self.base().id
  }

  pub fn header(&self) -> &str {
    &self.base().header
  }

  pub fn header_style(&self) -> Style {
    self.base().header_style
  }

  pub fn width_constraint(&self) -> Constraint {
    self.base().width
  }

  pub fn is_sortable(&self) -> bool {
    self.base().sort.is_some()
  }

  pub fn is_full_cell(&self) -> bool {
    matches!(self, Self::FullCell { .. })
  }

  pub(crate) fn sort_accessor(&self) -> Option<&SortAccessor<T>> {
    self.base().sort.as_ref()
  }

  /// Sort value for a row, or `None` when the column is not sortable.
  pub fn sort_value(&self, row: &T) -> Option<SortValue> {
    self.sort_accessor().map(|accessor| accessor(row))
  }

  pub fn render_cell(&self, row: &T) -> Cell<'static> {
    match self {
      Self::Content {
        render, cell_style, ..
      } => Cell::from(render(row)).style(*cell_style),
      Self::FullCell { render, .. } => render(row),
    }
  }
}

impl<T> fmt::Debug for ColumnDef<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ColumnDef")
      .field("id", &self.id())
      .field("full_cell", &self.is_full_cell())
      .field("sortable", &self.is_sortable())
      .finish()
  }
}
