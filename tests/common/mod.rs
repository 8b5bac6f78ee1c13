use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::catalog::CreateItemRequest,
    services::payments::{CreateSessionRequest, GatewaySession, PaymentGateway},
    AppState,
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// In-memory stand-in for the payment provider. Sessions start unpaid;
/// tests flip them with [`MockGateway::set_paid`].
#[derive(Clone, Default)]
pub struct MockGateway {
    sessions: Arc<DashMap<String, GatewaySession>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a session as paid, the way the real provider would after a
    /// successful card charge.
    pub fn set_paid(&self, session_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.payment_status = "paid".to_string();
        }
    }

    pub fn session(&self, session_id: &str) -> Option<GatewaySession> {
        self.sessions.get(session_id).map(|s| s.clone())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        let amount_total: i64 = request
            .line_items
            .iter()
            .map(|l| l.unit_amount * l.quantity as i64)
            .sum();
        let session = GatewaySession {
            id: format!("cs_test_{}", Uuid::new_v4().simple()),
            url: Some("https://checkout.example.com/pay".to_string()),
            payment_status: "unpaid".to_string(),
            amount_total: Some(amount_total),
            currency: Some(request.currency),
            customer_email: request.customer_email,
            metadata: request.metadata,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<GatewaySession, ServiceError> {
        self.sessions
            .get(session_id)
            .map(|s| s.clone())
            .ok_or_else(|| ServiceError::ProviderError("No such session".to_string()))
    }
}

/// Helper harness backed by an in-memory SQLite database and the mock
/// payment gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: MockGateway,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_64_chars_long_padding!".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::ensure_schema(&pool)
            .await
            .expect("failed to bootstrap schema in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_expiration,
        )));

        let gateway = MockGateway::new();
        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            event_sender.clone(),
            auth_service,
            Arc::new(gateway.clone()),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Deliver a raw webhook body with the given header set.
    pub async fn post_webhook(
        &self,
        payload: &[u8],
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/checkout/webhook")
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(payload.to_vec()))
            .expect("failed to build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook request")
    }

    /// Register a customer over the API, returning (customer_id, token).
    pub async fn register_customer(&self, login_id: &str) -> (Uuid, String) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(serde_json::json!({
                    "first_name": "Test",
                    "last_name": "Customer",
                    "email": format!("{login_id}@example.com"),
                    "login_id": login_id,
                    "password": "hunter2hunter2",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let customer_id = body["customer_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("customer id in registration response");
        let token = body["access_token"]
            .as_str()
            .expect("token in registration response")
            .to_string();
        (customer_id, token)
    }

    /// Insert a catalog item directly through the service layer.
    pub async fn seed_item(&self, name: &str, price: Decimal, inventory: i32) -> Uuid {
        let item = self
            .state
            .services
            .catalog
            .create_item(CreateItemRequest {
                name: name.to_string(),
                description: format!("{name} description"),
                price,
                inventory,
                category: "general".to_string(),
            })
            .await
            .expect("failed to seed item");
        item.id
    }
}

/// Parse a money field from a JSON body. Databases that store decimals
/// as floating point drop trailing zeros ("25" for "25.00"), so money
/// assertions compare parsed values, never strings.
pub fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("money field serialized as a string")
        .parse()
        .expect("money field parses as a decimal")
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not JSON")
}

/// Produce a `t=...,v1=...` signature header over a webhook payload.
pub fn sign_webhook(payload: &[u8], secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Build a `checkout.session.completed` webhook body for a session.
pub fn completed_event_payload(session: &GatewaySession) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session.id,
            "payment_status": "paid",
            "amount_total": session.amount_total,
            "currency": session.currency,
            "metadata": session.metadata,
        }}
    }))
    .expect("failed to serialize webhook payload")
}
