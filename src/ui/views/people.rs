use crate::fetch::{FetchStore, ResourceHandle};
use crate::persist::Storage;
use crate::store::StoreError;
use crate::swapi::{people_columns, ApiBase, Person, Planet, PEOPLE, PLANET_BY_URL};
use crate::table::SortEntry;
use crate::ui::components::KeyResult;
use crate::ui::renderfns::state_color;
use crate::ui::resource_table::{ResourceTable, TablePrefs};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{listing_shortcuts, PlanetDetailView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::warn;

/// People listing with the selected person's homeworld underneath
pub struct PeopleView {
  fetch: FetchStore,
  people: ResourceHandle<Vec<Person>>,
  table: ResourceTable<Person>,
  homeworld: Option<ResourceHandle<Planet>>,
}

impl PeopleView {
  pub fn new(fetch: &FetchStore, storage: &Storage, base: &ApiBase) -> Result<Self, StoreError> {
    let people = fetch.use_resource(&PEOPLE, base)?;
    let mut table = ResourceTable::new(people_columns(), TablePrefs::new(storage, "people"));
    table.set_data(people.item().data);
    let mut view = Self {
      fetch: fetch.clone(),
      people,
      table,
      homeworld: None,
    };
    view.follow_selection();
    Ok(view)
  }

  pub fn apply_overrides(&mut self, columns: Option<Vec<String>>, sort: Option<Vec<SortEntry>>) {
    self.table.apply_overrides(columns, sort);
    self.follow_selection();
  }

  /// Observe the selected person's homeworld, releasing the previous one.
  fn follow_selection(&mut self) {
    let link = self.table.selected_row().map(|p| p.homeworld.clone());
    let current = self.homeworld.as_ref().and_then(|h| h.url());
    if self.homeworld.is_some() && current == link.as_deref() {
      return;
    }

    self.homeworld = None;
    if link.is_none() {
      return;
    }
    match self.fetch.use_resource(&PLANET_BY_URL, &link) {
      Ok(handle) => self.homeworld = Some(handle),
      Err(e) => warn!(error = %e, "failed to observe homeworld"),
    }
  }

  fn homeworld_line(&self) -> Line<'static> {
    let Some(handle) = &self.homeworld else {
      return Line::styled("No selection", Style::default().fg(Color::DarkGray));
    };
    let item = handle.item();
    let label = Span::styled("Homeworld: ", Style::default().fg(Color::DarkGray));
    let status = match (&item.data, &item.error, item.state) {
      (Some(planet), _, _) => {
        let mut spans = vec![Span::styled(
          planet.name.clone(),
          Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )];
        spans.push(Span::styled(
          format!(
            "  {}  pop {}",
            planet.climate.join(", "),
            planet.population
          ),
          Style::default().fg(Color::DarkGray),
        ));
        spans
      }
      (None, Some(e), _) => vec![Span::styled(
        format!("error: {}", e),
        Style::default().fg(Color::Red),
      )],
      (None, None, state) => vec![Span::styled(
        format!("{}...", state),
        Style::default().fg(state_color(state)),
      )],
    };
    let mut spans = vec![label];
    spans.extend(status);
    Line::from(spans)
  }

  fn sync(&mut self) {
    if self.people.changed() {
      self.table.set_data(self.people.item().data);
      self.follow_selection();
    }
    self.table.sync_prefs();
  }
}

impl View for PeopleView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.refresh(false),
      KeyCode::Char('R') => self.refresh(true),
      KeyCode::Enter => {
        let link = self.table.selected_row().map(|p| p.homeworld.clone());
        if link.is_some() {
          match PlanetDetailView::new(&self.fetch, link) {
            Ok(view) => return ViewAction::Push(Box::new(view)),
            Err(e) => warn!(error = %e, "failed to open planet"),
          }
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {
        if let KeyResult::NotHandled = self.table.handle_key(key) {
          return ViewAction::None;
        }
        // Sorting moves rows under the cursor too
        self.follow_selection();
      }
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.sync();

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(3)])
      .split(area);

    let item = self.people.item();
    self.table.render(frame, chunks[0], "People", &item);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(self.homeworld_line()).block(block), chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "People".to_string()
  }

  fn tick(&mut self) {
    self.sync();
  }

  fn refresh(&mut self, force: bool) {
    self.people.refetch(force);
  }

  fn reset(&mut self) {
    self.table.reset();
    self.follow_selection();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = listing_shortcuts();
    shortcuts.push(ShortcutInfo::new("enter", "homeworld").with_priority(25));
    shortcuts
  }
}
