use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedCustomer;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, no_content_response, success_response, validate_input};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AddCartItemRequest {
    pub item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
}

pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_item))
        .route("/items/:item_id", put(update_item).delete(remove_item))
        .route("/clear", delete(clear_cart))
}

/// The caller's cart, enriched with current catalog prices.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart contents", body = crate::services::cart::CartView),
        (status = 401, description = "Not authenticated")
    ),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .carts
        .view(customer.customer_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(view))
}

/// Add an item to the cart. Re-adding an item replaces its quantity.
#[utoipa::path(
    post,
    path = "/api/v1/cart",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = crate::services::cart::CartView),
        (status = 404, description = "Item does not exist")
    ),
    tag = "cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state
        .services
        .carts
        .add_item(customer.customer_id, payload.item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(view))
}

async fn update_item(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .carts
        .update_item(customer.customer_id, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(view))
}

async fn remove_item(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .carts
        .remove_item(customer.customer_id, item_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(view))
}

/// Empty the cart. Succeeds even when the cart is already empty.
async fn clear_cart(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    state.services.carts.clear(customer.customer_id).await;
    Ok(no_content_response())
}
