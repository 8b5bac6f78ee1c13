use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::cart::CartLine;

type HmacSha256 = Hmac<Sha256>;

/// Version tag stored in session metadata so stale snapshots from older
/// deployments are rejected instead of misread.
pub const SNAPSHOT_VERSION: &str = "1";

const META_VERSION: &str = "snapshot_version";
const META_CUSTOMER_ID: &str = "customer_id";
const META_CART: &str = "cart";
const META_SHIPPING_ADDRESS: &str = "shipping_address";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct ShippingAddressInput {
    #[validate(length(min = 1, max = 255))]
    pub address_line1: String,
    #[validate(length(max = 255))]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub city: String,
    #[validate(length(min = 1, max = 64))]
    pub state_code: String,
    #[validate(length(min = 2, max = 2))]
    pub country_code: String,
    #[validate(length(min = 1, max = 32))]
    pub postal_code: String,
}

/// Everything needed to materialize an order later, carried through the
/// payment provider as session metadata.
#[derive(Debug, Clone)]
pub struct CheckoutSnapshot {
    pub customer_id: Uuid,
    pub cart: Vec<CartLine>,
    pub shipping_address: ShippingAddressInput,
}

impl CheckoutSnapshot {
    pub fn into_metadata(self) -> Result<HashMap<String, String>, ServiceError> {
        let mut meta = HashMap::new();
        meta.insert(META_VERSION.to_string(), SNAPSHOT_VERSION.to_string());
        meta.insert(META_CUSTOMER_ID.to_string(), self.customer_id.to_string());
        meta.insert(
            META_CART.to_string(),
            serde_json::to_string(&self.cart)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
        );
        meta.insert(
            META_SHIPPING_ADDRESS.to_string(),
            serde_json::to_string(&self.shipping_address)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
        );
        Ok(meta)
    }

    /// Reconstructs the snapshot from session metadata, rejecting
    /// missing keys and unknown versions.
    pub fn from_metadata(meta: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let version = meta
            .get(META_VERSION)
            .ok_or_else(|| ServiceError::BadRequest("Session metadata missing version".into()))?;
        if version != SNAPSHOT_VERSION {
            return Err(ServiceError::BadRequest(format!(
                "Unsupported session metadata version {}",
                version
            )));
        }

        let customer_id = meta
            .get(META_CUSTOMER_ID)
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                ServiceError::BadRequest("Session metadata missing customer id".into())
            })?;

        let cart: Vec<CartLine> = meta
            .get(META_CART)
            .ok_or_else(|| ServiceError::BadRequest("Session metadata missing cart".into()))
            .and_then(|raw| {
                serde_json::from_str(raw)
                    .map_err(|e| ServiceError::BadRequest(format!("Malformed cart metadata: {}", e)))
            })?;

        let shipping_address: ShippingAddressInput = meta
            .get(META_SHIPPING_ADDRESS)
            .ok_or_else(|| {
                ServiceError::BadRequest("Session metadata missing shipping address".into())
            })
            .and_then(|raw| {
                serde_json::from_str(raw).map_err(|e| {
                    ServiceError::BadRequest(format!("Malformed shipping address metadata: {}", e))
                })
            })?;

        Ok(Self {
            customer_id,
            cart,
            shipping_address,
        })
    }
}

/// Classified payment state of a provider session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Paid,
    Unpaid,
    Unknown,
}

/// A checkout session as reported by the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub payment_status: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GatewaySession {
    pub fn status(&self) -> SessionStatus {
        match self.payment_status.as_str() {
            "paid" | "no_payment_required" => SessionStatus::Paid,
            "unpaid" => SessionStatus::Unpaid,
            _ => SessionStatus::Unknown,
        }
    }
}

/// One display line sent to the provider's hosted checkout page.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    /// Unit price in the currency's minor unit (cents).
    pub unit_amount: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub currency: String,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Payment provider abstraction. Production uses [`StripeGateway`];
/// tests substitute an in-memory fake.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<GatewaySession, ServiceError>;
}

/// Stripe Checkout Sessions client over the form-encoded REST API.
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(
        secret_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email".into(), email.clone()));
        }
        for (i, line) in request.line_items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                request.currency.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                line.name.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                line.unit_amount.to_string(),
            ));
            form.push((
                format!("line_items[{}][quantity]", i),
                line.quantity.to_string(),
            ));
        }
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        form
    }

    async fn decode_session(response: reqwest::Response) -> Result<GatewaySession, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ProviderError(format!(
                "Payment provider returned {}: {}",
                status, body
            )));
        }
        response
            .json::<GatewaySession>()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("Malformed provider response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request))]
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        let form = Self::session_form(&request);
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("Provider request failed: {}", e)))?;
        Self::decode_session(response).await
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> Result<GatewaySession, ServiceError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.base_url, session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::ProviderError(format!("Provider request failed: {}", e)))?;
        Self::decode_session(response).await
    }
}

/// Verifies a provider webhook signature header of the form
/// `t=<unix>,v1=<hex>`. The signed payload is the exact raw bytes of the
/// request body prefixed with `{t}.`, and timestamps outside the
/// tolerance window are rejected to limit replay.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance: Duration,
) -> Result<(), ServiceError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::SignatureInvalid("Missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(ServiceError::SignatureInvalid(
            "Missing v1 signature".to_string(),
        ));
    }

    let age = (Utc::now().timestamp() - timestamp).unsigned_abs();
    if age > tolerance.as_secs() {
        return Err(ServiceError::SignatureInvalid(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    // Mac::verify_slice gives a constant-time comparison.
    for candidate in signatures {
        if let Ok(bytes) = hex::decode(candidate) {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|e| ServiceError::InternalError(format!("HMAC init failed: {}", e)))?;
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(payload);
            if mac.verify_slice(&bytes).is_ok() {
                return Ok(());
            }
        }
    }

    Err(ServiceError::SignatureInvalid(
        "No matching signature".to_string(),
    ))
}
