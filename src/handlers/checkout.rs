use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthenticatedCustomer;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::services::payments::ShippingAddressInput;
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateSessionBody {
    #[validate]
    pub shipping_address: ShippingAddressInput,
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/create-session", post(create_session))
        .route("/verify-session/:session_id", get(verify_session))
        .route("/webhook", post(webhook))
}

/// Create a hosted payment session from the caller's cart.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/create-session",
    request_body = CreateSessionBody,
    responses(
        (status = 201, description = "Session created", body = crate::services::checkout::CheckoutSessionResponse),
        (status = 400, description = "Cart is empty or address invalid"),
        (status = 404, description = "A cart item no longer exists"),
        (status = 502, description = "Payment provider unavailable")
    ),
    tag = "checkout"
)]
pub async fn create_session(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(payload): Json<CreateSessionBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let session = state
        .services
        .checkout
        .create_session(
            customer.customer_id,
            Some(customer.email),
            payload.shipping_address,
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_response(session))
}

/// Poll a session after returning from the hosted payment page. A paid
/// session materializes the order and clears the cart.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/verify-session/{session_id}",
    params(("session_id" = String, Path, description = "Payment session id")),
    responses(
        (status = 200, description = "Verification outcome", body = crate::services::checkout::VerifyOutcome),
        (status = 502, description = "Payment provider unavailable")
    ),
    tag = "checkout"
)]
pub async fn verify_session(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .checkout
        .verify_session(customer.customer_id, &session_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

/// Payment provider webhook. Unauthenticated; trust comes solely from
/// the signature header over the raw body bytes.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Delivery acknowledged"),
        (status = 400, description = "Signature missing or invalid")
    ),
    tag = "checkout"
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    state
        .services
        .checkout
        .handle_webhook(&body, signature)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({ "received": true })))
}
