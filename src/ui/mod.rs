pub mod components;
pub mod renderfns;
pub mod theme;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::{Block, ListState, Tabs};

use crate::store::GroceryStore;
use components::CommandInput;
use renderfns::{draw_footer, draw_header};
use theme::Theme;
use view::{Notice, ShortcutInfo, View};
use views::{ChatView, GroceryListView};

/// Terminals at least this wide show both panes side by side
pub const WIDE_LAYOUT_MIN_WIDTH: u16 = 100;

pub fn is_wide(width: u16) -> bool {
  width >= WIDE_LAYOUT_MIN_WIDTH
}

/// Which pane receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  List,
  Chat,
}

impl Focus {
  /// Wide layouts start in the chat; narrow ones on the list tab
  pub fn initial(width: u16) -> Self {
    if is_wide(width) {
      Focus::Chat
    } else {
      Focus::List
    }
  }

  pub fn toggle(self) -> Self {
    match self {
      Focus::List => Focus::Chat,
      Focus::Chat => Focus::List,
    }
  }
}

/// Everything a frame draws, borrowed from App for the duration of a draw
pub struct Screen<'a> {
  pub store: &'a GroceryStore,
  pub list: &'a mut GroceryListView,
  pub chat: &'a mut ChatView,
  pub focus: Focus,
  pub command: &'a CommandInput,
  pub notice: Option<&'a Notice>,
  pub offline: &'a str,
}

/// Keep a list selection inside the list, selecting the first row by default
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, screen: Screen) {
  let Screen {
    store,
    list,
    chat,
    focus,
    command,
    notice,
    offline,
  } = screen;

  let theme = Theme::for_mode(store.dark_mode());
  let area = frame.area();
  frame.render_widget(
    Block::default().style(Style::default().bg(theme.background).fg(theme.text)),
    area,
  );

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Panes
      Constraint::Length(1), // Footer
    ])
    .split(area);

  draw_header(
    frame,
    chunks[0],
    &theme,
    store.unchecked_count(),
    store.dark_mode(),
    offline,
  );

  let focused: &dyn View = match focus {
    Focus::List => &*list,
    Focus::Chat => &*chat,
  };
  let shortcuts = footer_shortcuts(focused);

  let body = chunks[1];
  if is_wide(area.width) {
    let panes = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
      .split(body);
    list.render(frame, panes[0], store, &theme, focus == Focus::List);
    chat.render(frame, panes[1], store, &theme, focus == Focus::Chat);
  } else {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(1)])
      .split(body);

    let selected = match focus {
      Focus::List => 0,
      Focus::Chat => 1,
    };
    let tabs = Tabs::new(vec![list.title(), chat.title()])
      .select(selected)
      .style(Style::default().fg(theme.muted))
      .highlight_style(Style::default().fg(theme.primary).bold());
    frame.render_widget(tabs, rows[0]);

    match focus {
      Focus::List => list.render(frame, rows[1], store, &theme, true),
      Focus::Chat => chat.render(frame, rows[1], store, &theme, true),
    }
  }

  draw_footer(frame, chunks[2], &theme, notice, &shortcuts);

  // Overlay last so it sits above the panes
  command.render_overlay(frame, body, &theme);
}

fn footer_shortcuts(focused: &dyn View) -> Vec<ShortcutInfo> {
  let mut shortcuts = focused.shortcuts();
  shortcuts.push(ShortcutInfo::new("tab", "switch pane").with_priority(50));
  if focused.captures_text() {
    shortcuts.push(ShortcutInfo::new("ctrl-c", "quit").with_priority(70));
  } else {
    shortcuts.push(ShortcutInfo::new(":", "command").with_priority(60));
    shortcuts.push(ShortcutInfo::new("q", "quit").with_priority(70));
  }
  shortcuts
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{resolve_base_url, ApiClient, GroceryClient};
  use crate::net::testing::MockTransport;
  use ratatui::backend::TestBackend;
  use std::sync::Arc;

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(7));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }

  #[test]
  fn test_initial_focus_follows_width() {
    assert_eq!(Focus::initial(120), Focus::Chat);
    assert_eq!(Focus::initial(80), Focus::List);
    assert_eq!(Focus::List.toggle(), Focus::Chat);
  }

  fn render(width: u16, focus: Focus) -> String {
    let client = GroceryClient::new(ApiClient::new(
      resolve_base_url(None),
      Arc::new(MockTransport::new()),
    ));
    let mut list = GroceryListView::new(client.clone());
    let mut chat = ChatView::new(client);
    let store = GroceryStore::in_memory();
    let command = CommandInput::new();

    let mut terminal = Terminal::new(TestBackend::new(width, 24)).unwrap();
    terminal
      .draw(|frame| {
        draw(
          frame,
          Screen {
            store: &store,
            list: &mut list,
            chat: &mut chat,
            focus,
            command: &command,
            notice: None,
            offline: "offline off",
          },
        )
      })
      .unwrap();

    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[test]
  fn test_wide_layout_shows_both_panes() {
    let screen = render(120, Focus::Chat);
    assert!(screen.contains("Grocer"));
    assert!(screen.contains("Grocery List"));
    assert!(screen.contains("Chat Assistant"));
  }

  #[test]
  fn test_narrow_layout_shows_focused_pane() {
    let screen = render(80, Focus::List);
    assert!(screen.contains("Your grocery list is empty."));
    assert!(!screen.contains("Chat Assistant"));

    let screen = render(80, Focus::Chat);
    assert!(screen.contains("Chat Assistant"));
    assert!(!screen.contains("Your grocery list is empty."));
  }
}
