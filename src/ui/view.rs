use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use std::time::{Duration, Instant};

use super::theme::Theme;
use crate::store::GroceryStore;

/// A keyboard shortcut hint for display in the footer
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Success,
  Error,
}

/// Transient message shown in the footer until it expires
#[derive(Debug, Clone)]
pub struct Notice {
  pub text: String,
  pub level: NoticeLevel,
  expires_at: Instant,
}

impl Notice {
  const ERROR_TTL: Duration = Duration::from_secs(6);

  pub fn success(text: impl Into<String>, ttl: Duration) -> Self {
    Self {
      text: text.into(),
      level: NoticeLevel::Success,
      expires_at: Instant::now() + ttl,
    }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      level: NoticeLevel::Error,
      expires_at: Instant::now() + Self::ERROR_TTL,
    }
  }

  pub fn is_expired(&self, now: Instant) -> bool {
    now >= self.expires_at
  }
}

/// Actions that a view can request in response to user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
  /// Key consumed, nothing else to do
  None,
  /// Key not consumed, App should try its global bindings
  NotHandled,
}

/// Trait for pane behavior
///
/// Panes read and mutate the shared store; App owns it and lends it for the
/// duration of each call. Panes that call the service should use
/// Mutation<I, T> internally and poll it in tick().
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent, store: &mut GroceryStore) -> ViewAction;

  /// Render the pane to the frame
  fn render(
    &mut self,
    frame: &mut Frame,
    area: Rect,
    store: &GroceryStore,
    theme: &Theme,
    focused: bool,
  );

  /// Label for the tab bar
  fn title(&self) -> &'static str;

  /// Called on each tick to poll in-flight requests
  fn tick(&mut self, _store: &mut GroceryStore) -> Option<Notice> {
    None
  }

  /// Whether plain characters are typed into the pane rather than bound
  fn captures_text(&self) -> bool {
    false
  }

  /// Pane-specific shortcuts for the footer
  fn shortcuts(&self) -> Vec<ShortcutInfo>;
}
