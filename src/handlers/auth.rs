use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::auth::{AuthToken, AuthenticatedCustomer};
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::services::customers::RegisterCustomerRequest;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub login_id: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub customer_id: uuid::Uuid,
    pub email: String,
    pub name: String,
    #[serde(flatten)]
    pub token: AuthToken,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub customer_id: uuid::Uuid,
    pub email: String,
    pub name: String,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/status", get(status))
}

/// Register a new customer and issue a session token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterCustomerRequest,
    responses(
        (status = 201, description = "Customer registered", body = SessionResponse),
        (status = 409, description = "Email or login already in use"),
        (status = 400, description = "Invalid input")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .customers
        .register(payload)
        .await
        .map_err(map_service_error)?;
    let token = state
        .services
        .auth
        .generate_token(&customer)
        .map_err(map_service_error)?;

    info!(customer_id = %customer.id, "Customer registered");
    Ok(created_response(SessionResponse {
        customer_id: customer.id,
        email: customer.email,
        name: format!("{} {}", customer.first_name, customer.last_name),
        token,
    }))
}

/// Exchange credentials for a session token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .verifier
        .verify(&payload.login_id, &payload.password)
        .await
        .map_err(map_service_error)?;
    let token = state
        .services
        .auth
        .generate_token(&customer)
        .map_err(map_service_error)?;

    Ok(success_response(SessionResponse {
        customer_id: customer.id,
        email: customer.email,
        name: format!("{} {}", customer.first_name, customer.last_name),
        token,
    }))
}

/// Sessions are stateless JWTs, so logout is client-side token disposal.
async fn logout(_customer: AuthenticatedCustomer) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(serde_json::json!({
        "message": "Logged out"
    })))
}

/// Report who the bearer token belongs to.
async fn status(customer: AuthenticatedCustomer) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(AuthStatusResponse {
        authenticated: true,
        customer_id: customer.customer_id,
        email: customer.email,
        name: customer.name,
    }))
}
