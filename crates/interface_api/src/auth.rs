//! Authentication and authorization

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::RiderId;

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject; for riders, the rider id
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// The acting rider. Riders act only as themselves; the id never comes
    /// from a request body.
    pub fn rider_id(&self) -> Result<RiderId, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }

    pub fn require(&self, role: &str) -> Result<(), AuthError> {
        if has_role(self, role) {
            Ok(())
        } else {
            Err(AuthError::MissingPermission(role.to_string()))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == roles::ADMIN)
    }
}

/// Claims inserted by `auth_middleware`
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Claims {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == roles::ADMIN)
}

/// Role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const RIDER: &str = "rider";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let rider = RiderId::new();
        let token = create_token(&rider.to_string(), vec![roles::RIDER.into()], SECRET, 60).unwrap();

        let claims = validate_token(&token, SECRET).unwrap();

        assert_eq!(claims.rider_id().unwrap(), rider);
        assert!(claims.require(roles::RIDER).is_ok());
        assert!(claims.require(roles::ADMIN).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("someone", vec![], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_admin_has_every_role() {
        let claims = Claims {
            sub: "ops".into(),
            roles: vec![roles::ADMIN.into()],
            exp: 0,
            iat: 0,
        };
        assert!(has_role(&claims, roles::RIDER));
        assert!(claims.rider_id().is_err());
    }
}
