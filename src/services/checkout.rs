use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::orders::{MaterializeOutcome, MaterializeRequest, OrderService};
use crate::services::payments::{
    verify_webhook_signature, CheckoutSnapshot, CreateSessionRequest, GatewaySession,
    PaymentGateway, SessionLineItem, SessionStatus, ShippingAddressInput,
};

/// Checkout settings carried from application config.
#[derive(Clone)]
pub struct CheckoutConfig {
    pub frontend_url: String,
    pub currency: String,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance: Duration,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Outcome of polling a session after the customer returns from the
/// hosted payment page.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct VerifyOutcome {
    pub paid: bool,
    pub payment_status: String,
    pub order_id: Option<Uuid>,
    /// Set when payment succeeded but the order could not be recorded;
    /// the webhook path will retry materialization.
    pub order_creation_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: serde_json::Value,
}

/// Orchestrates checkout: session creation against the payment provider
/// and the two confirmation paths (customer return and provider webhook)
/// that both funnel into the order ledger.
#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    carts: CartService,
    catalog: CatalogService,
    orders: OrderService,
    config: CheckoutConfig,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        carts: CartService,
        catalog: CatalogService,
        orders: OrderService,
        config: CheckoutConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            gateway,
            carts,
            catalog,
            orders,
            config,
            event_sender,
        }
    }

    /// Creates a hosted checkout session from the caller's current cart.
    /// The cart and shipping address are snapshotted into session
    /// metadata so confirmation does not depend on server memory.
    #[instrument(skip(self, shipping_address, customer_email))]
    pub async fn create_session(
        &self,
        customer_id: Uuid,
        customer_email: Option<String>,
        shipping_address: ShippingAddressInput,
    ) -> Result<CheckoutSessionResponse, ServiceError> {
        shipping_address.validate()?;

        let cart = self.carts.snapshot(customer_id);
        if cart.is_empty() {
            return Err(ServiceError::BadRequest("Cart is empty".to_string()));
        }

        // Prices always come from the catalog at session-creation time.
        let ids: Vec<Uuid> = cart.iter().map(|l| l.item_id).collect();
        let items = self.catalog.resolve_many(&ids).await?;
        if items.len() != ids.len() {
            return Err(ServiceError::NotFound(
                "An item in the cart no longer exists".to_string(),
            ));
        }

        let mut line_items = Vec::with_capacity(cart.len());
        for line in &cart {
            let item = items
                .iter()
                .find(|i| i.id == line.item_id)
                .ok_or_else(|| ServiceError::NotFound("Item not found".to_string()))?;
            let unit_amount = (item.price * Decimal::from(100))
                .round()
                .to_i64()
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Price for item {} out of range",
                        item.id
                    ))
                })?;
            line_items.push(SessionLineItem {
                name: item.name.clone(),
                unit_amount,
                quantity: line.quantity,
            });
        }

        let metadata = CheckoutSnapshot {
            customer_id,
            cart,
            shipping_address,
        }
        .into_metadata()?;

        let session = self
            .gateway
            .create_checkout_session(CreateSessionRequest {
                currency: self.config.currency.clone(),
                line_items,
                success_url: format!(
                    "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.config.frontend_url
                ),
                cancel_url: format!("{}/checkout/cancel", self.config.frontend_url),
                customer_email,
                metadata,
            })
            .await?;

        info!(session_id = %session.id, "Checkout session created");
        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                customer_id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(CheckoutSessionResponse {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Confirms payment after the customer returns from the hosted page.
    /// A paid session is materialized into an order; materialization
    /// failure is reported but does not mask the successful payment.
    #[instrument(skip(self))]
    pub async fn verify_session(
        &self,
        customer_id: Uuid,
        session_id: &str,
    ) -> Result<VerifyOutcome, ServiceError> {
        let session = self.gateway.retrieve_session(session_id).await?;

        if session.status() != SessionStatus::Paid {
            return Ok(VerifyOutcome {
                paid: false,
                payment_status: session.payment_status,
                order_id: None,
                order_creation_error: None,
            });
        }

        let snapshot = CheckoutSnapshot::from_metadata(&session.metadata)?;
        if snapshot.customer_id != customer_id {
            return Err(ServiceError::Unauthorized(
                "Session belongs to a different customer".to_string(),
            ));
        }

        self.event_sender
            .send_or_log(Event::PaymentConfirmed {
                session_id: session.id.clone(),
            })
            .await;

        let payment_status = session.payment_status.clone();
        match self.materialize_session(&session, snapshot).await {
            Ok(outcome) => {
                self.carts.clear(customer_id).await;
                Ok(VerifyOutcome {
                    paid: true,
                    payment_status,
                    order_id: Some(outcome.order_id()),
                    order_creation_error: None,
                })
            }
            Err(e) => {
                error!(session_id, error = %e, "Paid session could not be recorded");
                Ok(VerifyOutcome {
                    paid: true,
                    payment_status,
                    order_id: None,
                    order_creation_error: Some(e.to_string()),
                })
            }
        }
    }

    /// Handles a provider webhook delivery. Verification fails closed:
    /// without a configured webhook secret every delivery is rejected.
    #[instrument(skip(self, payload, signature_header))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), ServiceError> {
        let secret = self.config.webhook_secret.as_deref().ok_or_else(|| {
            ServiceError::SignatureInvalid("Webhook secret not configured".to_string())
        })?;
        let header = signature_header.ok_or_else(|| {
            ServiceError::SignatureInvalid("Missing signature header".to_string())
        })?;
        verify_webhook_signature(payload, header, secret, self.config.webhook_tolerance)?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: GatewaySession = serde_json::from_value(event.data.object)
                    .map_err(|e| {
                        ServiceError::BadRequest(format!("Malformed session object: {}", e))
                    })?;
                let session_id = session.id.clone();

                self.event_sender
                    .send_or_log(Event::PaymentConfirmed {
                        session_id: session_id.clone(),
                    })
                    .await;

                match CheckoutSnapshot::from_metadata(&session.metadata) {
                    Ok(snapshot) => {
                        let customer_id = snapshot.customer_id;
                        match self.materialize_session(&session, snapshot).await {
                            Ok(MaterializeOutcome::Created(order_id)) => {
                                info!(%order_id, session_id, "Order recorded from webhook");
                                self.carts.clear(customer_id).await;
                            }
                            Ok(MaterializeOutcome::Existing(order_id)) => {
                                info!(%order_id, session_id, "Webhook session already recorded");
                            }
                            // The delivery is still acknowledged; the
                            // verify-session path can complete the order.
                            Err(e) => {
                                error!(session_id, error = %e, "Webhook materialization failed")
                            }
                        }
                    }
                    Err(e) => {
                        warn!(session_id, error = %e, "Webhook session metadata unusable")
                    }
                }
                Ok(())
            }
            other => {
                info!(event_type = other, "Ignoring webhook event");
                Ok(())
            }
        }
    }

    async fn materialize_session(
        &self,
        session: &GatewaySession,
        snapshot: CheckoutSnapshot,
    ) -> Result<MaterializeOutcome, ServiceError> {
        let amount_total_minor = session.amount_total.ok_or_else(|| {
            ServiceError::BadRequest("Session is missing an amount total".to_string())
        })?;
        let currency = session
            .currency
            .clone()
            .unwrap_or_else(|| self.config.currency.clone());

        self.orders
            .materialize(MaterializeRequest {
                payment_session_id: session.id.clone(),
                customer_id: snapshot.customer_id,
                cart: snapshot.cart,
                shipping_address: snapshot.shipping_address,
                amount_total_minor,
                currency,
            })
            .await
    }
}
