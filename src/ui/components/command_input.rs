use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crate::ui::theme::Theme;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

/// Events emitted by command input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// Command submitted, resolved to a command name when one matched
  Submitted(String),
  /// Command cancelled
  Cancelled,
}

/// Command input component with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  fn deactivate(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  /// Get autocomplete suggestions for current input
  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  /// Handle a key event
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.deactivate();
        return KeyResult::Event(CommandEvent::Cancelled);
      }
      KeyCode::Enter => {
        let cmd = self.resolve_command();
        self.deactivate();
        return KeyResult::Event(CommandEvent::Submitted(cmd));
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.suggestions().len().min(MAX_SUGGESTIONS);
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.suggestions().len().min(MAX_SUGGESTIONS);
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.input.handle_key(key) {
      InputResult::Consumed => {
        self.selected_suggestion = 0; // Reset on input change
        KeyResult::Handled
      }
      InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
      // Swallow everything else while the overlay is open
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Resolve the final command (from suggestion or direct input)
  fn resolve_command(&self) -> String {
    self
      .suggestions()
      .get(self.selected_suggestion)
      .map(|cmd| cmd.name.to_string())
      .unwrap_or_else(|| self.input.value().trim().to_lowercase())
  }

  /// Render the command overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let suggestion_count = suggestions.len().min(MAX_SUGGESTIONS);

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = (3 + suggestion_count as u16).min(area.height);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(theme.primary))
      .style(Style::default().bg(theme.paper).fg(theme.text))
      .title(" Command ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Input line
        Constraint::Min(0),    // Suggestions
      ])
      .split(inner);

    let input_line = Line::from(vec![
      Span::styled(":", Style::default().fg(theme.primary)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(theme.primary)), // Cursor
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    if suggestion_count > 0 && chunks[1].height > 0 {
      let items: Vec<ListItem> = suggestions
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|cmd| {
          ListItem::new(Line::from(vec![
            Span::styled(
              format!("{:<10}", cmd.name),
              Style::default().fg(theme.primary),
            ),
            Span::styled(cmd.description, Style::default().fg(theme.muted)),
          ]))
        })
        .collect();

      let list = List::new(items).highlight_style(
        Style::default()
          .bg(theme.primary)
          .fg(theme.paper)
          .add_modifier(Modifier::BOLD),
      );

      let mut state = ListState::default();
      state.select(Some(self.selected_suggestion));

      frame.render_stateful_widget(list, chunks[1], &mut state);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(cmd: &mut CommandInput, s: &str) {
    for c in s.chars() {
      cmd.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_inactive_ignores_keys() {
    let mut cmd = CommandInput::new();
    assert_eq!(cmd.handle_key(key(KeyCode::Char('t'))), KeyResult::NotHandled);
    assert!(!cmd.is_active());
  }

  #[test]
  fn test_colon_activates() {
    let mut cmd = CommandInput::new();
    assert_eq!(cmd.handle_key(key(KeyCode::Char(':'))), KeyResult::Handled);
    assert!(cmd.is_active());
  }

  #[test]
  fn test_submit_resolves_prefix_to_command() {
    let mut cmd = CommandInput::new();
    cmd.activate();
    type_str(&mut cmd, "th");

    let result = cmd.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(CommandEvent::Submitted("theme".to_string()))
    );
    assert!(!cmd.is_active());
  }

  #[test]
  fn test_tab_cycles_suggestions() {
    let mut cmd = CommandInput::new();
    cmd.activate();
    cmd.handle_key(key(KeyCode::Tab));

    let result = cmd.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(CommandEvent::Submitted(commands::COMMANDS[1].name.to_string()))
    );
  }

  #[test]
  fn test_unknown_input_is_passed_through() {
    let mut cmd = CommandInput::new();
    cmd.activate();
    type_str(&mut cmd, "zzz");

    let result = cmd.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(CommandEvent::Submitted("zzz".to_string()))
    );
  }

  #[test]
  fn test_escape_cancels() {
    let mut cmd = CommandInput::new();
    cmd.activate();
    type_str(&mut cmd, "qu");

    assert_eq!(
      cmd.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(CommandEvent::Cancelled)
    );
    assert!(!cmd.is_active());
  }
}
