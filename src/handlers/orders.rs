use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedCustomer;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::services::cart::CartLine;
use crate::services::payments::ShippingAddressInput;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct PostOrderRequest {
    pub items: Vec<CartLine>,
    #[validate]
    pub shipping_address: ShippingAddressInput,
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_order))
        .route("/customer/:customer_id", get(list_customer_orders))
        .route("/postOrder", post(post_order))
}

/// Fetch one order with its lines and shipping address. Customers can
/// only see their own orders.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order details", body = crate::services::orders::OrderDetails),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;
    // Another customer's order is indistinguishable from a missing one.
    if details.customer_id != customer.customer_id {
        return Err(ApiError::NotFound(format!("Order {} not found", id)));
    }
    Ok(success_response(details))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/customer/{customer_id}",
    params(("customer_id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Order history", body = [crate::services::orders::OrderDetails]),
        (status = 404, description = "No orders for this customer")
    ),
    tag = "orders"
)]
pub async fn list_customer_orders(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if customer_id != customer.customer_id {
        return Err(ApiError::Unauthorized);
    }
    let orders = state
        .services
        .orders
        .list_for_customer(customer_id)
        .await
        .map_err(map_service_error)?;
    if orders.is_empty() {
        return Err(ApiError::NotFound("No orders found".to_string()));
    }
    Ok(success_response(orders))
}

/// Record an order directly, without going through payment. The order
/// stays pending and inventory is untouched; prices are read from the
/// catalog, never from the request.
#[utoipa::path(
    post,
    path = "/api/v1/orders/postOrder",
    request_body = PostOrderRequest,
    responses(
        (status = 201, description = "Order recorded"),
        (status = 400, description = "Empty order or invalid quantities"),
        (status = 404, description = "An item does not exist")
    ),
    tag = "orders"
)]
pub async fn post_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<PostOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order_id = state
        .services
        .orders
        .place_order(
            customer.customer_id,
            payload.items,
            payload.shipping_address,
            state.config.currency.clone(),
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_response(serde_json::json!({ "order_id": order_id })))
}
