use ratatui::prelude::Color;

use crate::fetch::ResourceFetchState;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a resource's fetch state
pub fn state_color(state: ResourceFetchState) -> Color {
  match state {
    ResourceFetchState::Success => Color::Green,
    ResourceFetchState::Loading => Color::Yellow,
    ResourceFetchState::Error => Color::Red,
    ResourceFetchState::Stale => Color::DarkGray,
  }
}
