//! Integration tests for catalog endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, decimal_field, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn empty_catalog_is_not_found() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/items", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_and_fetching_items() {
    let app = TestApp::new().await;
    let widget = app.seed_item("Widget", dec!(9.99), 3).await;
    app.seed_item("Gadget", dec!(4.50), 1).await;

    let response = app.request(Method::GET, "/api/v1/items", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let items = body_json(response).await;
    assert_eq!(items.as_array().unwrap().len(), 2);

    let response = app
        .request(Method::GET, &format!("/api/v1/items/{}", widget), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let item = body_json(response).await;
    assert_eq!(item["name"], json!("Widget"));
    assert_eq!(decimal_field(&item["price"]), dec!(9.99));
}

#[tokio::test]
async fn name_search_matches_substrings_case_insensitively() {
    let app = TestApp::new().await;
    app.seed_item("Super Widget", dec!(1.00), 3).await;
    app.seed_item("Widget", dec!(1.00), 3).await;
    app.seed_item("Gadget", dec!(1.00), 3).await;

    // A lowercase fragment matches every name containing it.
    let response = app
        .request(Method::GET, "/api/v1/items/itemname/widget", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let items = body_json(response).await;
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Super Widget", "Widget"]);

    let response = app
        .request(Method::GET, "/api/v1/items/itemname/wIdGeT", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

    let response = app
        .request(Method::GET, "/api/v1/items/itemname/missing", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_lookup_filters_and_404s_when_empty() {
    let app = TestApp::new().await;
    app.seed_item("Widget", dec!(1.00), 3).await;

    let response = app
        .request(Method::GET, "/api/v1/items/category/general", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .request(Method::GET, "/api/v1/items/category/nonexistent", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_creation_validates_input() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/items",
            Some(json!({
                "name": "",
                "description": "empty name",
                "price": "1.00",
                "inventory": 1,
                "category": "general"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/items",
            Some(json!({
                "name": "Priced Wrong",
                "description": "negative price",
                "price": "-1.00",
                "inventory": 1,
                "category": "general"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
