//! Wire types of the grocery service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line on the shopping list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroceryItem {
  pub id: String,
  pub name: String,
  pub aisle: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub quantity: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub quantity_unit: Option<String>,
  #[serde(default)]
  pub checked: bool,
}

impl GroceryItem {
  /// "(2 lbs)", "(3)", or None when there is no quantity
  pub fn quantity_label(&self) -> Option<String> {
    let quantity = self.quantity.as_deref().filter(|q| !q.is_empty())?;
    match self.quantity_unit.as_deref().filter(|u| !u.is_empty()) {
      Some(unit) => Some(format!("({} {})", quantity, unit)),
      None => Some(format!("({})", quantity)),
    }
  }
}

/// The whole list, keyed by aisle
pub type GroceryList = BTreeMap<String, Vec<GroceryItem>>;

/// Number of items not yet checked off
pub fn unchecked_count(items: &[GroceryItem]) -> usize {
  items.iter().filter(|item| !item.checked).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: Role,
  pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageRequest<'a> {
  pub message: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
  pub response: String,
  #[serde(default)]
  pub updated_list: Option<GroceryList>,
}

#[derive(Debug, Serialize)]
pub struct UpdateItemRequest<'a> {
  pub item_id: &'a str,
  pub checked: bool,
}

/// Error body; FastAPI puts the message in `detail`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub detail: Option<serde_json::Value>,
  pub message: Option<String>,
}

impl ApiErrorBody {
  pub fn into_message(self) -> Option<String> {
    match self.detail {
      Some(serde_json::Value::String(detail)) if !detail.is_empty() => Some(detail),
      _ => self.message.filter(|m| !m.is_empty()),
    }
  }
}
