use crate::fetch::{FetchStore, ResourceHandle};
use crate::persist::Storage;
use crate::store::StoreError;
use crate::swapi::{planet_columns, ApiBase, Planet, PLANETS};
use crate::table::SortEntry;
use crate::ui::resource_table::{ResourceTable, TablePrefs};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{listing_shortcuts, PlanetDetailView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use tracing::warn;

/// Planets listing
pub struct PlanetsView {
  fetch: FetchStore,
  planets: ResourceHandle<Vec<Planet>>,
  table: ResourceTable<Planet>,
}

impl PlanetsView {
  pub fn new(fetch: &FetchStore, storage: &Storage, base: &ApiBase) -> Result<Self, StoreError> {
    let planets = fetch.use_resource(&PLANETS, base)?;
    let mut table = ResourceTable::new(planet_columns(), TablePrefs::new(storage, "planets"));
    table.set_data(planets.item().data);
    Ok(Self {
      fetch: fetch.clone(),
      planets,
      table,
    })
  }

  pub fn apply_overrides(&mut self, columns: Option<Vec<String>>, sort: Option<Vec<SortEntry>>) {
    self.table.apply_overrides(columns, sort);
  }

  fn sync(&mut self) {
    if self.planets.changed() {
      self.table.set_data(self.planets.item().data);
    }
    self.table.sync_prefs();
  }
}

impl View for PlanetsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.refresh(false),
      KeyCode::Char('R') => self.refresh(true),
      KeyCode::Enter => {
        let link = self.table.selected_row().map(|p| p.url.clone());
        if link.is_some() {
          match PlanetDetailView::new(&self.fetch, link) {
            Ok(view) => return ViewAction::Push(Box::new(view)),
            Err(e) => warn!(error = %e, "failed to open planet"),
          }
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {
        self.table.handle_key(key);
      }
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.sync();
    let item = self.planets.item();
    self.table.render(frame, area, "Planets", &item);
  }

  fn breadcrumb_label(&self) -> String {
    "Planets".to_string()
  }

  fn tick(&mut self) {
    self.sync();
  }

  fn refresh(&mut self, force: bool) {
    self.planets.refetch(force);
  }

  fn reset(&mut self) {
    self.table.reset();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = listing_shortcuts();
    shortcuts.push(ShortcutInfo::new("enter", "details").with_priority(25));
    shortcuts
  }
}
