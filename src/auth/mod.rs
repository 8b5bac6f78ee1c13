use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::customer;
use crate::errors::ServiceError;
use crate::AppState;

const TOKEN_ISSUER: &str = "storefront-api";
const TOKEN_AUDIENCE: &str = "storefront-clients";

/// Claims embedded in issued session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Customer id
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Unique token id
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Token material returned to clients after login or registration.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
    expiration_secs: u64,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, expiration_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_secs,
        }
    }
}

/// Issues and validates JWT session tokens.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn generate_token(&self, customer: &customer::Model) -> Result<AuthToken, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: customer.id.to_string(),
            email: customer.email.clone(),
            name: format!("{} {}", customer.first_name, customer.last_name),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.expiration_secs as i64,
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Failed to sign token: {}", e)))?;

        Ok(AuthToken {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.expiration_secs,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| ServiceError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(data.claims)
    }
}

/// Verifies login credentials against stored customer records.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, login_id: &str, password: &str)
        -> Result<customer::Model, ServiceError>;
}

/// The customer resolved from a bearer token, usable as an axum extractor.
#[derive(Debug, Clone)]
pub struct AuthenticatedCustomer {
    pub customer_id: Uuid,
    pub email: String,
    pub name: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCustomer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing authorization header".to_string())
            })?;

        let token = header_value
            .strip_prefix("Bearer ")
            .or_else(|| header_value.strip_prefix("bearer "))
            .ok_or_else(|| {
                ServiceError::Unauthorized("Authorization header must be a bearer token".to_string())
            })?;

        let claims = state.services.auth.validate_token(token)?;

        let customer_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Malformed token subject".to_string()))?;

        Ok(AuthenticatedCustomer {
            customer_id,
            email: claims.email,
            name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_customer() -> customer::Model {
        customer::Model {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            login_id: "ada".to_string(),
            password_hash: "irrelevant".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_round_trips() {
        let service = AuthService::new(AuthConfig::new("test-secret", 3600));
        let customer = sample_customer();

        let token = service.generate_token(&customer).unwrap();
        assert_eq!(token.token_type, "Bearer");

        let claims = service.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, customer.id.to_string());
        assert_eq!(claims.email, customer.email);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = AuthService::new(AuthConfig::new("secret-a", 3600));
        let verifier = AuthService::new(AuthConfig::new("secret-b", 3600));

        let token = issuer.generate_token(&sample_customer()).unwrap();
        assert!(matches!(
            verifier.validate_token(&token.access_token),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = AuthService::new(AuthConfig::new("test-secret", 3600));
        assert!(service.validate_token("not.a.jwt").is_err());
    }
}
