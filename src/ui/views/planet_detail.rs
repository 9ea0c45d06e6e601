use crate::fetch::{FetchStore, ResourceHandle};
use crate::store::StoreError;
use crate::swapi::{Planet, PLANET_BY_URL};
use crate::ui::cells::{mixed_line, tags_text};
use crate::ui::renderfns::state_color;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Single planet, looked up by its canonical URL
pub struct PlanetDetailView {
  planet: ResourceHandle<Planet>,
}

impl PlanetDetailView {
  pub fn new(fetch: &FetchStore, link: Option<String>) -> Result<Self, StoreError> {
    Ok(Self {
      planet: fetch.use_resource(&PLANET_BY_URL, &link)?,
    })
  }

  fn field(label: &str, value: impl Into<Line<'static>>) -> Line<'static> {
    let mut line: Line<'static> = value.into();
    line.alignment = None;
    let mut spans = vec![Span::styled(
      format!("{:<16}", label),
      Style::default().fg(Color::DarkGray),
    )];
    spans.extend(line.spans);
    Line::from(spans)
  }

  fn lines(planet: &Planet) -> Vec<Line<'static>> {
    vec![
      Self::field("Climate", tags_text(&planet.climate)),
      Self::field("Terrain", tags_text(&planet.terrain)),
      Self::field("Gravity", planet.gravity.clone()),
      Self::field("Population", mixed_line(&planet.population, "")),
      Self::field("Diameter", mixed_line(&planet.diameter, "km")),
      Self::field("Rotation", mixed_line(&planet.rotation_period, "h")),
      Self::field("Orbit", mixed_line(&planet.orbital_period, "days")),
      Self::field("Surface water", mixed_line(&planet.surface_water, "%")),
      Self::field("Residents", planet.residents.len().to_string()),
      Self::field("Films", planet.films.len().to_string()),
      Self::field("Edited", planet.edited.format("%Y-%m-%d %H:%M UTC").to_string()),
      Line::raw(""),
      Line::styled(planet.url.clone(), Style::default().fg(Color::DarkGray)),
    ]
  }
}

impl View for PlanetDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.refresh(false),
      KeyCode::Char('R') => self.refresh(true),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let item = self.planet.item();
    let name = item.data.as_ref().map(|p| p.name.as_str()).unwrap_or("Planet");
    let title = match (&item.error, item.is_loading()) {
      (_, true) => format!(" {} (loading...) ", name),
      (Some(e), false) => format!(" {} (error: {}) ", name, e),
      (None, false) => format!(" {} ", name),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(state_color(item.state)));

    let paragraph = match &item.data {
      Some(planet) => Paragraph::new(Self::lines(planet)),
      None if self.planet.url().is_none() => {
        Paragraph::new("No homeworld on record.").style(Style::default().fg(Color::DarkGray))
      }
      None => Paragraph::new("Loading planet...").style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block).wrap(Wrap { trim: false }), area);
  }

  fn breadcrumb_label(&self) -> String {
    self
      .planet
      .item()
      .data
      .map(|p| p.name.clone())
      .unwrap_or_else(|| "Planet".to_string())
  }

  fn refresh(&mut self, force: bool) {
    self.planet.refetch(force);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r/R", "refetch").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::swapi::fixtures::tatooine;

  #[test]
  fn test_lines_render_measures() {
    let planet = crate::swapi::PLANET_BY_URL.parse(tatooine()).unwrap();
    let lines = PlanetDetailView::lines(&planet);
    let population: String = lines[3].spans.iter().map(|s| s.content.as_ref()).collect();
    assert_eq!(population.trim_end(), format!("{:<16}200,000", "Population"));
    let diameter: String = lines[4].spans.iter().map(|s| s.content.as_ref()).collect();
    assert!(diameter.ends_with("10,465 km"));
  }
}
