use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CredentialVerifier;
use crate::entities::customer;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterCustomerRequest {
    #[validate(length(min = 1, max = 255))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 255))]
    pub login_id: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 255))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Customer registration, lookup and profile updates.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(login_id = %request.login_id))]
    pub async fn register(
        &self,
        request: RegisterCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;

        let existing = customer::Entity::find()
            .filter(
                Condition::any()
                    .add(customer::Column::Email.eq(request.email.clone()))
                    .add(customer::Column::LoginId.eq(request.login_id.clone())),
            )
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "A customer with that email or login already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;

        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(request.first_name),
            last_name: Set(request.last_name),
            email: Set(request.email),
            login_id: Set(request.login_id),
            password_hash: Set(password_hash),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = model.insert(self.db.as_ref()).await?;
        self.event_sender
            .send_or_log(Event::CustomerRegistered(saved.id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;

        let existing = self.get(id).await?;
        let mut active: customer::ActiveModel = existing.into();

        if let Some(first_name) = request.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = request.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        active.updated_at = Set(Utc::now());

        let saved = active.update(self.db.as_ref()).await?;
        self.event_sender
            .send_or_log(Event::CustomerUpdated(saved.id))
            .await;
        Ok(saved)
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Credential verification backed by the customers table.
#[derive(Clone)]
pub struct LocalCredentialVerifier {
    db: Arc<DatabaseConnection>,
}

impl LocalCredentialVerifier {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialVerifier for LocalCredentialVerifier {
    async fn verify(
        &self,
        login_id: &str,
        password: &str,
    ) -> Result<customer::Model, ServiceError> {
        let customer = customer::Entity::find()
            .filter(customer::Column::LoginId.eq(login_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        let parsed = PasswordHash::new(&customer.password_hash)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        Ok(customer)
    }
}
