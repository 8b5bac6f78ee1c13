use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Backend for a small storefront: catalog browsing, session carts,
hosted-payment checkout and order history.

## Authentication

Customer endpoints require a JWT issued by `/api/v1/auth/login` or
`/api/v1/auth/register`. Include it in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

The checkout webhook endpoint is unauthenticated; its trust comes from
the provider signature over the raw request body.

## Error Handling

Errors use a consistent shape with appropriate HTTP status codes:

```json
{
  "error": "Not Found",
  "message": "Item 3f6c... not found",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
"#
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::items::list_items,
        crate::handlers::items::get_item,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::checkout::create_session,
        crate::handlers::checkout::verify_session,
        crate::handlers::checkout::webhook,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_customer_orders,
        crate::handlers::orders::post_order,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::auth::AuthToken,
        crate::handlers::auth::LoginRequest,
        crate::handlers::auth::SessionResponse,
        crate::handlers::auth::AuthStatusResponse,
        crate::handlers::carts::AddCartItemRequest,
        crate::handlers::carts::UpdateCartItemRequest,
        crate::handlers::checkout::CreateSessionBody,
        crate::handlers::orders::PostOrderRequest,
        crate::services::cart::CartLine,
        crate::services::cart::CartView,
        crate::services::cart::CartViewLine,
        crate::services::catalog::CreateItemRequest,
        crate::services::customers::RegisterCustomerRequest,
        crate::services::customers::UpdateCustomerRequest,
        crate::services::checkout::CheckoutSessionResponse,
        crate::services::checkout::VerifyOutcome,
        crate::services::orders::OrderDetails,
        crate::services::orders::OrderLineDetails,
        crate::services::orders::ShippingAddressView,
        crate::services::payments::ShippingAddressInput,
        crate::entities::item::Model,
        crate::entities::order::OrderStatus,
    )),
    tags(
        (name = "auth", description = "Customer registration and sessions"),
        (name = "items", description = "Catalog browsing"),
        (name = "cart", description = "Session cart management"),
        (name = "checkout", description = "Hosted payment checkout"),
        (name = "orders", description = "Order ledger and history")
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated OpenAPI document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
