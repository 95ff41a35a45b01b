//! JWT service for token generation and validation
//!
//! Tokens are signed with HS256 using the shared secret so that the API
//! service can verify them with [`common::token::TokenVerifier`].

use anyhow::Result;
use common::token::{Claims, JwtConfig, TokenError, TokenType, TokenVerifier};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::User;

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    verifier: TokenVerifier,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        JwtService {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            verifier: TokenVerifier::new(&config),
            config,
        }
    }

    fn sign(&self, user: &User, roles: &[String], token_type: TokenType) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let expiry = match token_type {
            TokenType::Access => self.config.access_token_expiry,
            TokenType::Refresh => self.config.refresh_token_expiry,
        };

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            roles: roles.to_vec(),
            iat: now,
            exp: now + expiry,
            token_type,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Generate an access token carrying the user's role names
    pub fn generate_access_token(&self, user: &User, roles: &[String]) -> Result<String> {
        self.sign(user, roles, TokenType::Access)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        self.sign(user, &[], TokenType::Refresh)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verifier.verify_access(token)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verifier.verify_refresh(token)
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 86400,
        })
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            is_active: true,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_round_trips_claims() {
        let service = service();
        let user = user();
        let token = service
            .generate_access_token(&user, &["admin".to_string()])
            .unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert!(claims.is_staff());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let service = service();
        let token = service.generate_refresh_token(&user()).unwrap();

        assert!(service.validate_refresh_token(&token).is_ok());
        assert!(matches!(
            service.validate_access_token(&token),
            Err(TokenError::WrongType { .. })
        ));
    }
}
