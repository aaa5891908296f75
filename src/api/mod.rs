//! Client for the remote grocery service.

mod client;
mod grocery;
pub mod types;

pub use client::{resolve_base_url, ApiClient};
pub use grocery::GroceryClient;
