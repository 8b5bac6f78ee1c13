use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use uuid::Uuid;

use crate::auth::AuthenticatedCustomer;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::services::customers::UpdateCustomerRequest;
use crate::AppState;

pub fn customers_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_customer))
        .route("/update", put(update_customer))
}

/// Fetch a customer profile. Callers can only read their own.
async fn get_customer(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if id != customer.customer_id {
        return Err(ApiError::Unauthorized);
    }
    let profile = state
        .services
        .customers
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

/// Update the caller's profile fields.
async fn update_customer(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let updated = state
        .services
        .customers
        .update(customer.customer_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(updated))
}
