//! Integration tests for cart endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, decimal_field, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn cart_requires_authentication() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_cart_reads_as_empty() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("cartless").await;

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["lines"].as_array().unwrap().is_empty());
    assert_eq!(decimal_field(&body["total"]), dec!(0));
}

#[tokio::test]
async fn adding_an_item_twice_replaces_quantity() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("replacer").await;
    let widget = app.seed_item("Widget", dec!(10.00), 10).await;

    for qty in [3, 2] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/cart",
                Some(json!({ "item_id": widget, "quantity": qty })),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = body_json(response).await;
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], json!(2));
    assert_eq!(decimal_field(&body["total"]), dec!(20.00));
}

#[tokio::test]
async fn adding_unknown_item_is_rejected() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("ghost").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "item_id": Uuid::new_v4(), "quantity": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn adding_more_than_available_inventory_is_rejected() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("hoarder").await;
    let widget = app.seed_item("Widget", dec!(10.00), 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "item_id": widget, "quantity": 6 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Only 5 units available for Widget"));

    // The rejected add must not leave a line behind.
    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = body_json(response).await;
    assert!(body["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn updating_quantity_to_zero_removes_the_line() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("zeroer").await;
    let widget = app.seed_item("Widget", dec!(1.00), 10).await;

    app.request(
        Method::POST,
        "/api/v1/cart",
        Some(json!({ "item_id": widget, "quantity": 4 })),
        Some(&token),
    )
    .await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", widget),
            Some(json!({ "quantity": 0 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn updating_an_absent_line_is_not_found() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("absent").await;
    let widget = app.seed_item("Widget", dec!(1.00), 10).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/cart/items/{}", widget),
            Some(json!({ "quantity": 2 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn removing_a_line_then_clearing_is_idempotent() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("clearer").await;
    let widget = app.seed_item("Widget", dec!(2.00), 10).await;
    let gadget = app.seed_item("Gadget", dec!(3.00), 10).await;

    for item in [widget, gadget] {
        app.request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "item_id": item, "quantity": 1 })),
            Some(&token),
        )
        .await;
    }

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", widget),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["lines"].as_array().unwrap().len(), 1);

    // Clearing twice both succeed.
    for _ in 0..2 {
        let response = app
            .request(Method::DELETE, "/api/v1/cart/clear", None, Some(&token))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn carts_are_isolated_per_customer() {
    let app = TestApp::new().await;
    let (_id_a, token_a) = app.register_customer("alice").await;
    let (_id_b, token_b) = app.register_customer("bob").await;
    let widget = app.seed_item("Widget", dec!(5.00), 10).await;

    app.request(
        Method::POST,
        "/api/v1/cart",
        Some(json!({ "item_id": widget, "quantity": 2 })),
        Some(&token_a),
    )
    .await;

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token_b))
        .await;
    let body = body_json(response).await;
    assert!(body["lines"].as_array().unwrap().is_empty());
}
