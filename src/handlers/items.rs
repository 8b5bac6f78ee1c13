use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::services::catalog::CreateItemRequest;
use crate::AppState;

pub fn items_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item))
        .route("/itemname/:name", get(get_item_by_name))
        .route("/category/:category", get(list_by_category))
}

/// List the full catalog.
#[utoipa::path(
    get,
    path = "/api/v1/items",
    responses(
        (status = 200, description = "Catalog items", body = [crate::entities::item::Model]),
        (status = 404, description = "Catalog is empty")
    ),
    tag = "items"
)]
pub async fn list_items(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .services
        .catalog
        .list_items()
        .await
        .map_err(map_service_error)?;
    if items.is_empty() {
        return Err(ApiError::NotFound("No items found".to_string()));
    }
    Ok(success_response(items))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item", body = crate::entities::item::Model),
        (status = 404, description = "Item not found")
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .catalog
        .get_item(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

/// Search items by name, matching substrings case-insensitively.
async fn get_item_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .services
        .catalog
        .find_by_name(&name)
        .await
        .map_err(map_service_error)?;
    if items.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No items found matching '{}'",
            name
        )));
    }
    Ok(success_response(items))
}

async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .services
        .catalog
        .find_by_category(&category)
        .await
        .map_err(map_service_error)?;
    if items.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No items found in category '{}'",
            category
        )));
    }
    Ok(success_response(items))
}

async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let item = state
        .services
        .catalog
        .create_item(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(item))
}
