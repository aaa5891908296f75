mod chat;
mod grocery_list;

pub use chat::ChatView;
pub use grocery_list::GroceryListView;

/// Assistant message appended when a user action fails
pub const ERROR_REPLY: &str =
  "Sorry, I encountered an error processing your request. Please try again.";
