//! Client-side list and chat state.
//!
//! The store is the single in-memory source of truth for the views. Every
//! mutation is synchronous and last-writer-wins. Items and the theme flag are
//! written through to a durable record; the chat transcript lives only for
//! the session.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::types::{unchecked_count, ChatMessage, GroceryItem, GroceryList, Role};
use crate::db::Database;

/// Name of the durable record
pub const STORE_RECORD: &str = "grocery-store";

/// Subset of the store that survives a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
  #[serde(default)]
  pub items: GroceryList,
  #[serde(default = "default_dark_mode")]
  pub dark_mode: bool,
}

impl Default for PersistedState {
  fn default() -> Self {
    Self {
      items: GroceryList::new(),
      dark_mode: default_dark_mode(),
    }
  }
}

fn default_dark_mode() -> bool {
  true
}

/// On-disk envelope: `{"state": {...}, "version": 0}`
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
  state: PersistedState,
  #[serde(default)]
  version: u32,
}

pub struct GroceryStore {
  items: GroceryList,
  messages: Vec<ChatMessage>,
  dark_mode: bool,
  db: Option<Database>,
}

impl GroceryStore {
  /// A store with nothing behind it
  pub fn in_memory() -> Self {
    Self::from_state(PersistedState::default(), None)
  }

  /// Load the persisted record; an absent or unreadable one yields defaults
  pub fn load(db: Database) -> Self {
    let state = match db.get_item(STORE_RECORD) {
      Ok(Some(raw)) => match serde_json::from_str::<Envelope>(&raw) {
        Ok(envelope) => envelope.state,
        Err(e) => {
          warn!(error = %e, "ignoring unreadable persisted store");
          PersistedState::default()
        }
      },
      Ok(None) => PersistedState::default(),
      Err(e) => {
        warn!(error = %e, "failed to read persisted store");
        PersistedState::default()
      }
    };
    Self::from_state(state, Some(db))
  }

  fn from_state(state: PersistedState, db: Option<Database>) -> Self {
    Self {
      items: state.items,
      messages: Vec::new(),
      dark_mode: state.dark_mode,
      db,
    }
  }

  pub fn items(&self) -> &GroceryList {
    &self.items
  }

  pub fn messages(&self) -> &[ChatMessage] {
    &self.messages
  }

  pub fn dark_mode(&self) -> bool {
    self.dark_mode
  }

  /// Unchecked items across every aisle
  pub fn unchecked_count(&self) -> usize {
    self.items.values().map(|items| unchecked_count(items)).sum()
  }

  pub fn snapshot(&self) -> PersistedState {
    PersistedState {
      items: self.items.clone(),
      dark_mode: self.dark_mode,
    }
  }

  /// Append items to an aisle, creating it if needed
  pub fn add_items(&mut self, aisle: &str, items: Vec<GroceryItem>) {
    self
      .items
      .entry(aisle.to_string())
      .or_default()
      .extend(items);
    self.persist();
  }

  pub fn update_item(&mut self, aisle: &str, item_id: &str, checked: bool) {
    let Some(items) = self.items.get_mut(aisle) else {
      return;
    };
    for item in items.iter_mut().filter(|item| item.id == item_id) {
      item.checked = checked;
    }
    self.persist();
  }

  /// Remove an item; the aisle goes with its last item
  pub fn remove_item(&mut self, aisle: &str, item_id: &str) {
    let Some(items) = self.items.get_mut(aisle) else {
      return;
    };
    items.retain(|item| item.id != item_id);
    if items.is_empty() {
      self.items.remove(aisle);
    }
    self.persist();
  }

  pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
    self.messages.push(ChatMessage {
      role,
      content: content.into(),
    });
  }

  pub fn clear_messages(&mut self) {
    self.messages.clear();
  }

  pub fn toggle_dark_mode(&mut self) {
    self.dark_mode = !self.dark_mode;
    self.persist();
  }

  /// Replace the whole list, typically with a server-confirmed one
  pub fn set_items(&mut self, items: GroceryList) {
    self.items = items;
    self.persist();
  }

  fn persist(&self) {
    let Some(db) = &self.db else {
      return;
    };

    let envelope = Envelope {
      state: self.snapshot(),
      version: 0,
    };
    let result = serde_json::to_string(&envelope)
      .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize store: {}", e))
      .and_then(|raw| db.set_item(STORE_RECORD, &raw));

    if let Err(e) = result {
      warn!(error = %e, "failed to persist store");
    }
  }
}
