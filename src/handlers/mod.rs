pub mod auth;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod customers;
pub mod items;
pub mod orders;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::auth::{AuthService, CredentialVerifier};
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::checkout::CheckoutConfig;
use crate::services::customers::LocalCredentialVerifier;
use crate::services::{
    CartService, CatalogService, CheckoutService, CustomerService, OrderService, PaymentGateway,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub customers: CustomerService,
    pub orders: OrderService,
    pub checkout: CheckoutService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: EventSender,
        auth_service: Arc<AuthService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let catalog = CatalogService::new(db.clone());
        let carts = CartService::new(catalog.clone(), event_sender.clone());
        let customers = CustomerService::new(db.clone(), event_sender.clone());
        let orders = OrderService::new(db.clone(), event_sender.clone());
        let checkout = CheckoutService::new(
            gateway,
            carts.clone(),
            catalog.clone(),
            orders.clone(),
            CheckoutConfig {
                frontend_url: config.frontend_url.clone(),
                currency: config.currency.clone(),
                webhook_secret: config.payment_webhook_secret.clone(),
                webhook_tolerance: Duration::from_secs(config.payment_webhook_tolerance_secs),
            },
            event_sender,
        );
        let verifier: Arc<dyn CredentialVerifier> = Arc::new(LocalCredentialVerifier::new(db));

        Self {
            auth: auth_service,
            verifier,
            catalog,
            carts,
            customers,
            orders,
            checkout,
        }
    }
}
