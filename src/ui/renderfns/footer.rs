use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::theme::Theme;
use crate::ui::view::{Notice, NoticeLevel, ShortcutInfo};

/// Draw the footer: the active notice if any, otherwise key hints
pub fn draw_footer(
  frame: &mut Frame,
  area: Rect,
  theme: &Theme,
  notice: Option<&Notice>,
  shortcuts: &[ShortcutInfo],
) {
  let line = match notice {
    Some(notice) => {
      let (icon, color) = match notice.level {
        NoticeLevel::Success => ("✓", theme.secondary),
        NoticeLevel::Error => ("✗", theme.error),
      };
      Line::from(vec![
        Span::styled(format!(" {} ", icon), Style::default().fg(color).bold()),
        Span::styled(notice.text.clone(), Style::default().fg(color)),
      ])
    }
    None => {
      let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
      sorted.sort_by_key(|s| s.priority);

      let mut spans = vec![Span::raw(" ")];
      for shortcut in sorted {
        spans.push(Span::styled(
          format!("<{}>", shortcut.key),
          Style::default().fg(theme.primary),
        ));
        spans.push(Span::styled(
          format!(" {}   ", shortcut.label),
          Style::default().fg(theme.muted),
        ));
      }
      Line::from(spans)
    }
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(theme.paper));
  frame.render_widget(paragraph, area);
}
