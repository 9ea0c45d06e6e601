pub mod cells;
pub mod components;
pub mod renderfns;
pub mod resource_table;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Current view
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app
    .current_view()
    .map(|view| view.shortcuts())
    .unwrap_or_default();
  renderfns::draw_header(frame, chunks[0], app.title(), app.base_url(), &shortcuts);

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }
  app.command().render_overlay(frame, chunks[1]);

  match app.flash() {
    Some(message) => {
      let paragraph = Paragraph::new(format!(" {}", message))
        .style(Style::default().fg(Color::Red).bg(Color::Black));
      frame.render_widget(paragraph, chunks[2]);
    }
    None => renderfns::draw_footer(frame, chunks[2], &app.view_breadcrumb(), app.in_flight()),
  }
}
