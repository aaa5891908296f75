use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::theme::Theme;

/// Draw the header bar with logo, list total, theme and offline state
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  theme: &Theme,
  unchecked: usize,
  dark_mode: bool,
  offline: &str,
) {
  let separator = || Span::styled("│", Style::default().fg(theme.muted));

  let header = Line::from(vec![
    Span::styled(" Grocer ", Style::default().fg(theme.primary).bold()),
    separator(),
    Span::styled(
      format!(" {} ", items_label(unchecked)),
      Style::default().fg(theme.secondary).bold(),
    ),
    separator(),
    Span::styled(
      format!(" {} ", if dark_mode { "dark" } else { "light" }),
      Style::default().fg(theme.text),
    ),
    separator(),
    Span::styled(format!(" {} ", offline), Style::default().fg(theme.muted)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(theme.paper));
  frame.render_widget(paragraph, area);
}

fn items_label(unchecked: usize) -> String {
  match unchecked {
    0 => "nothing to get".to_string(),
    1 => "1 item to get".to_string(),
    n => format!("{} items to get", n),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_items_label() {
    assert_eq!(items_label(0), "nothing to get");
    assert_eq!(items_label(1), "1 item to get");
    assert_eq!(items_label(12), "12 items to get");
  }
}
