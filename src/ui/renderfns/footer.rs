use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with view breadcrumb and the number of requests in flight
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], in_flight: usize) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i + 1 == breadcrumb.len() {
      Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(1), Constraint::Length(16)])
    .split(area);

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, chunks[0]);

  let activity = if in_flight == 0 {
    Span::styled("idle ", Style::default().fg(Color::DarkGray))
  } else {
    Span::styled(
      format!("{} fetching ", in_flight),
      Style::default().fg(Color::Yellow),
    )
  };
  let paragraph = Paragraph::new(Line::from(activity).alignment(Alignment::Right))
    .style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, chunks[1]);
}
