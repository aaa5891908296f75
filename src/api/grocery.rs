//! Grocery service endpoints.

use color_eyre::Result;
use url::form_urlencoded;

use super::client::{ApiClient, RequestOptions};
use super::types::{GroceryList, MessageRequest, MessageResponse, UpdateItemRequest};

#[derive(Clone)]
pub struct GroceryClient {
  api: ApiClient,
}

impl GroceryClient {
  pub fn new(api: ApiClient) -> Self {
    Self { api }
  }

  /// Send a chat message; the reply may carry the updated list
  pub async fn send_message(&self, message: &str) -> Result<MessageResponse> {
    let options = RequestOptions::post().json(&MessageRequest { message })?;
    self.api.request("message", options).await
  }

  /// Set an item's checked flag, returning the whole list
  pub async fn update_item(&self, aisle: &str, item_id: &str, checked: bool) -> Result<GroceryList> {
    let query = form_urlencoded::Serializer::new(String::new())
      .append_pair("aisle", aisle)
      .finish();
    let options = RequestOptions::post().json(&UpdateItemRequest { item_id, checked })?;
    self
      .api
      .request(&format!("item/update?{}", query), options)
      .await
  }

  /// Remove an item, returning the whole list
  pub async fn remove_item(&self, aisle: &str, item_id: &str) -> Result<GroceryList> {
    let query = form_urlencoded::Serializer::new(String::new())
      .append_pair("aisle", aisle)
      .append_pair("item_id", item_id)
      .finish();
    self
      .api
      .request(&format!("item/remove?{}", query), RequestOptions::post())
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::client::resolve_base_url;
  use crate::api::types::Role;
  use crate::net::HttpTransport;
  use crate::store::GroceryStore;
  use serde_json::json;
  use std::sync::Arc;
  use url::Url;
  use wiremock::matchers::{body_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> GroceryClient {
    let base = resolve_base_url(Some(&server.uri()));
    let origin = Url::parse(&base).unwrap().origin();
    GroceryClient::new(ApiClient::new(
      base,
      Arc::new(HttpTransport::new(origin).unwrap()),
    ))
  }

  fn dairy_list(milk_checked: bool) -> serde_json::Value {
    json!({
      "Dairy": [
        {"id": "1", "name": "Milk", "aisle": "Dairy", "quantity": "1", "quantity_unit": "gallon", "checked": milk_checked},
        {"id": "2", "name": "Eggs", "aisle": "Dairy", "quantity": "12", "checked": false}
      ]
    })
  }

  #[tokio::test]
  async fn test_add_milk_and_eggs_groups_items_under_aisle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/message"))
      .and(body_json(json!({"message": "Add milk and eggs"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "response": "I've added milk and eggs to your list.",
        "updated_list": dairy_list(false),
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    let reply = client.send_message("Add milk and eggs").await.unwrap();

    let mut store = GroceryStore::in_memory();
    store.add_message(Role::Assistant, reply.response.clone());
    store.set_items(reply.updated_list.unwrap());

    let dairy = &store.items()["Dairy"];
    let names: Vec<&str> = dairy.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Milk", "Eggs"]);
    assert!(dairy.iter().all(|i| !i.checked));
    assert_eq!(store.unchecked_count(), 2);
  }

  #[tokio::test]
  async fn test_update_item_encodes_aisle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/item/update"))
      .and(query_param("aisle", "Dairy & Eggs"))
      .and(body_json(json!({"item_id": "1", "checked": true})))
      .respond_with(ResponseTemplate::new(200).set_body_json(dairy_list(true)))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    let list = client.update_item("Dairy & Eggs", "1", true).await.unwrap();

    assert!(list["Dairy"][0].checked);
  }

  #[tokio::test]
  async fn test_remove_item_sends_both_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/item/remove"))
      .and(query_param("aisle", "Produce"))
      .and(query_param("item_id", "a/b"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    let list = client.remove_item("Produce", "a/b").await.unwrap();

    assert!(list.is_empty());
  }
}
