//! Integration tests for order endpoints and direct order placement.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, decimal_field, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

fn shipping_address() -> serde_json::Value {
    json!({
        "address_line1": "9 Elm St",
        "address_line2": "Apt 2",
        "city": "Shelbyville",
        "state_code": "IL",
        "country_code": "US",
        "postal_code": "62565"
    })
}

#[tokio::test]
async fn post_order_uses_catalog_prices_and_stays_pending() {
    let app = TestApp::new().await;
    let (customer_id, token) = app.register_customer("direct1").await;
    let widget = app.seed_item("Widget", dec!(7.25), 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/postOrder",
            Some(json!({
                "items": [{ "item_id": widget, "quantity": 2 }],
                "shipping_address": shipping_address()
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let order_id = body["order_id"].as_str().expect("order id");

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&token),
        )
        .await;
    let order = body_json(response).await;
    assert_eq!(order["status"], json!("Pending"));
    assert_eq!(decimal_field(&order["order_price"]), dec!(14.50));
    assert_eq!(
        order["customer_id"].as_str(),
        Some(customer_id.to_string().as_str())
    );
    assert_eq!(order["shipping_address"]["postal_code"], json!("62565"));

    // Direct orders never touch inventory.
    let item = app.state.services.catalog.get_item(widget).await.unwrap();
    assert_eq!(item.inventory, 3);
}

#[tokio::test]
async fn post_order_rejects_empty_and_invalid_requests() {
    let app = TestApp::new().await;
    let (_customer_id, token) = app.register_customer("direct2").await;
    let widget = app.seed_item("Widget", dec!(1.00), 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/postOrder",
            Some(json!({ "items": [], "shipping_address": shipping_address() })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/postOrder",
            Some(json!({
                "items": [{ "item_id": widget, "quantity": 0 }],
                "shipping_address": shipping_address()
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/postOrder",
            Some(json!({
                "items": [{ "item_id": Uuid::new_v4(), "quantity": 1 }],
                "shipping_address": shipping_address()
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customers_cannot_read_each_others_orders() {
    let app = TestApp::new().await;
    let (_id_a, token_a) = app.register_customer("orders_alice").await;
    let (id_b, token_b) = app.register_customer("orders_bob").await;
    let widget = app.seed_item("Widget", dec!(2.00), 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/postOrder",
            Some(json!({
                "items": [{ "item_id": widget, "quantity": 1 }],
                "shipping_address": shipping_address()
            })),
            Some(&token_a),
        )
        .await;
    let order_id = body_json(response).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Someone else's order looks like a missing order.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&token_b),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // And history is scoped to the caller.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/customer/{}", id_b),
            None,
            Some(&token_a),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_with_no_orders_gets_not_found() {
    let app = TestApp::new().await;
    let (customer_id, token) = app.register_customer("no_orders").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/customer/{}", customer_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn simultaneous_materializations_record_one_order() {
    use storefront_api::services::cart::CartLine;
    use storefront_api::services::orders::MaterializeRequest;
    use storefront_api::services::payments::ShippingAddressInput;

    let app = TestApp::new().await;
    let (customer_id, _token) = app.register_customer("racer").await;
    let widget = app.seed_item("Widget", dec!(3.00), 10).await;

    // The webhook and poll paths can both reach the ledger with the same
    // session at the same time; whoever loses the unique-index race must
    // settle on the winner's order.
    let request = || MaterializeRequest {
        payment_session_id: "cs_test_race".to_string(),
        customer_id,
        cart: vec![CartLine {
            item_id: widget,
            quantity: 2,
        }],
        shipping_address: ShippingAddressInput {
            address_line1: "9 Elm St".to_string(),
            address_line2: None,
            city: "Shelbyville".to_string(),
            state_code: "IL".to_string(),
            country_code: "US".to_string(),
            postal_code: "62565".to_string(),
        },
        amount_total_minor: 600,
        currency: "usd".to_string(),
    };

    let orders = &app.state.services.orders;
    let (first, second) = tokio::join!(orders.materialize(request()), orders.materialize(request()));
    let first = first.expect("materialization succeeds");
    let second = second.expect("materialization succeeds");
    assert_eq!(first.order_id(), second.order_id());

    let history = orders.list_for_customer(customer_id).await.unwrap();
    assert_eq!(history.len(), 1);

    // Exactly one decrement for the shared session.
    let item = app.state.services.catalog.get_item(widget).await.unwrap();
    assert_eq!(item.inventory, 8);
}

#[tokio::test]
async fn order_history_lists_newest_first() {
    let app = TestApp::new().await;
    let (customer_id, token) = app.register_customer("historian").await;
    let widget = app.seed_item("Widget", dec!(1.00), 10).await;

    for qty in [1, 2] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/orders/postOrder",
                Some(json!({
                    "items": [{ "item_id": widget, "quantity": qty }],
                    "shipping_address": shipping_address()
                })),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/customer/{}", customer_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let orders = body_json(response).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["items"][0]["name"], json!("Widget"));
}
