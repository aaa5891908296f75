use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::warn;

use super::ERROR_REPLY;
use crate::api::types::{ChatMessage, MessageResponse, Role};
use crate::api::GroceryClient;
use crate::mutation::Mutation;
use crate::store::GroceryStore;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::wrap_text;
use crate::ui::theme::Theme;
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};

const GREETING: &str = "👋 Hi! I can help you create a grocery list. Try saying:";
const EXAMPLE_PROMPTS: &[&str] = &[
  "\"I want to make lasagna\"",
  "\"Add milk and eggs\"",
  "\"What can I make with chicken and pasta?\"",
];
const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Conversation with the assistant
pub struct ChatView {
  input: TextInput,
  send: Mutation<String, MessageResponse>,
  spinner: usize,
}

impl ChatView {
  pub fn new(client: GroceryClient) -> Self {
    let send = Mutation::new(move |message: String| {
      let client = client.clone();
      async move { client.send_message(&message).await.map_err(|e| e.to_string()) }
    });

    Self {
      input: TextInput::new(),
      send,
      spinner: 0,
    }
  }

  fn is_loading(&self) -> bool {
    self.send.is_pending()
  }

  /// Post a message. Blank input and input while a reply is pending are ignored.
  fn submit(&mut self, text: &str, store: &mut GroceryStore) {
    let message = text.trim();
    if message.is_empty() || self.is_loading() {
      return;
    }
    store.add_message(Role::User, message);
    self.send.mutate(message.to_string());
  }

  fn render_input(&self, frame: &mut Frame, area: Rect, theme: &Theme, focused: bool) {
    let border = if focused { theme.primary } else { theme.muted };
    let title = if self.is_loading() { " Sending... " } else { " Message " };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));
    let inner = block.inner(area);

    // Scroll horizontally so the cursor stays visible
    let visible = inner.width.saturating_sub(1) as usize;
    let cursor = self.input.cursor_position();
    let skip = cursor.saturating_sub(visible);

    let line = if self.input.is_empty() {
      Line::from(Span::styled("Type a message...", Style::default().fg(theme.muted)))
    } else {
      let shown: String = self.input.value().chars().skip(skip).take(visible + 1).collect();
      let color = if self.is_loading() { theme.muted } else { theme.text };
      Line::from(Span::styled(shown, Style::default().fg(color)))
    };
    frame.render_widget(Paragraph::new(line).block(block), area);

    if focused && inner.width > 0 && inner.height > 0 {
      let x = inner.x + (cursor - skip) as u16;
      frame.set_cursor_position(Position::new(x, inner.y));
    }
  }

  fn render_transcript(&self, frame: &mut Frame, area: Rect, store: &GroceryStore, theme: &Theme) {
    if store.messages().is_empty() && !self.is_loading() {
      let mut text = vec![Line::from(""), Line::from(GREETING), Line::from("")];
      text.extend(EXAMPLE_PROMPTS.iter().map(|p| Line::from(*p)));
      let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(theme.muted));
      frame.render_widget(paragraph, area);
      return;
    }

    let mut lines = transcript_lines(store.messages(), area.width as usize, theme);
    if self.is_loading() {
      let frame_idx = self.spinner % SPINNER.len();
      lines.push(Line::from(Span::styled(
        format!("{} Thinking...", SPINNER[frame_idx]),
        Style::default().fg(theme.muted),
      )));
    }

    // Stick to the newest message
    let scroll = lines.len().saturating_sub(area.height as usize);
    let scroll = u16::try_from(scroll).unwrap_or(u16::MAX);
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), area);
  }
}

/// Flatten the transcript into display lines.
///
/// User messages are right-aligned and assistant messages left-aligned,
/// each wrapped to three quarters of the width.
fn transcript_lines(messages: &[ChatMessage], width: usize, theme: &Theme) -> Vec<Line<'static>> {
  let wrap_width = (width * 3 / 4).max(10);
  let mut lines = Vec::new();

  for message in messages {
    let (label, alignment, color) = match message.role {
      Role::User => ("You", Alignment::Right, theme.primary),
      Role::Assistant => ("Assistant", Alignment::Left, theme.secondary),
    };

    lines.push(
      Line::from(Span::styled(label, Style::default().fg(color).bold())).alignment(alignment),
    );
    for text in wrap_text(&message.content, wrap_width) {
      lines.push(
        Line::from(Span::styled(text, Style::default().fg(theme.text))).alignment(alignment),
      );
    }
    lines.push(Line::from(""));
  }

  lines
}

impl View for ChatView {
  fn handle_key(&mut self, key: KeyEvent, store: &mut GroceryStore) -> ViewAction {
    // A ':' on an empty line opens the command overlay
    if key.code == KeyCode::Char(':') && (self.input.is_empty() || self.is_loading()) {
      return ViewAction::NotHandled;
    }

    // The input holds the message being sent and is cleared once the reply lands
    if self.is_loading() {
      return ViewAction::None;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(text) => {
        self.submit(&text, store);
        ViewAction::None
      }
      InputResult::Cancelled => {
        self.input.clear();
        ViewAction::None
      }
      InputResult::Consumed => ViewAction::None,
      InputResult::NotHandled => ViewAction::NotHandled,
    }
  }

  fn render(
    &mut self,
    frame: &mut Frame,
    area: Rect,
    store: &GroceryStore,
    theme: &Theme,
    focused: bool,
  ) {
    let border = if focused { theme.primary } else { theme.muted };
    let block = Block::default()
      .title(Span::styled(" Chat Assistant ", Style::default().fg(theme.text).bold()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border))
      .style(Style::default().bg(theme.paper));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),    // Transcript
        Constraint::Length(3), // Input
      ])
      .split(inner);

    self.render_transcript(frame, chunks[0], store, theme);
    self.render_input(frame, chunks[1], theme, focused);
  }

  fn title(&self) -> &'static str {
    "Chat"
  }

  fn tick(&mut self, store: &mut GroceryStore) -> Option<Notice> {
    if self.is_loading() {
      self.spinner = self.spinner.wrapping_add(1);
    }

    let outcome = self.send.poll()?;
    self.input.clear();

    match outcome {
      Ok(reply) => {
        store.add_message(Role::Assistant, reply.response);
        if let Some(list) = reply.updated_list.filter(|list| !list.is_empty()) {
          store.set_items(list);
        }
        None
      }
      Err(e) => {
        warn!(error = %e, "chat message failed");
        store.add_message(Role::Assistant, ERROR_REPLY);
        Some(Notice::error(ERROR_REPLY))
      }
    }
  }

  fn captures_text(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "send").with_priority(10),
      ShortcutInfo::new("esc", "clear input").with_priority(20),
    ]
  }
}
