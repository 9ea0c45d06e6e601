use ratatui::prelude::*;
use ratatui::widgets::Cell;

use crate::swapi::Measure;

/// A measure with its unit. Numbers are right-aligned with a dimmed unit,
/// free text ("unknown", "n/a") is centered and dimmed.
pub fn mixed_line(value: &Measure, unit: &str) -> Line<'static> {
  match value {
    Measure::Number(_) => {
      let mut spans = vec![Span::raw(value.to_string())];
      if !unit.is_empty() {
        spans.push(Span::styled(
          format!(" {}", unit),
          Style::default().fg(Color::DarkGray),
        ));
      }
      Line::from(spans).alignment(Alignment::Right)
    }
    Measure::Text(text) => Line::from(Span::styled(
      text.clone(),
      Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center),
  }
}

pub fn mixed_cell(value: &Measure, unit: &str) -> Cell<'static> {
  Cell::from(mixed_line(value, unit))
}

/// Comma-joined tags, or a dimmed dash when the list is empty.
pub fn tags_text(tags: &[String]) -> String {
  if tags.is_empty() {
    "-".to_string()
  } else {
    tags.join(", ")
  }
}
