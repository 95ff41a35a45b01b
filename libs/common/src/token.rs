//! JWT claim types and verification shared by the services
//!
//! The auth service signs tokens, every other service only verifies them.
//! Tokens are HS256 with a shared secret.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Role name that grants staff privileges
pub const STAFF_ROLE: &str = "admin";

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Access token expiration time in seconds (default: 60 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 1 day)
    pub refresh_token_expiry: u64,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Login email
    pub email: String,
    /// Role names held when the token was issued
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

impl Claims {
    /// True when the subject holds the staff role
    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(|r| r == STAFF_ROLE)
    }
}

/// Token verification failures
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("invalid or expired token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },
}

/// Verifies HS256 tokens issued by the auth service
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a token of any type
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Decode a token and require it to be of the given type
    pub fn verify_kind(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenType::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 86400,
        }
    }

    fn sign(secret: &str, token_type: TokenType, roles: Vec<String>) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "shopper@example.com".to_string(),
            roles,
            iat: now,
            exp: now + 600,
            token_type,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verifies_access_token() {
        let verifier = TokenVerifier::new(&config());
        let token = sign("test-secret", TokenType::Access, vec!["user".into()]);
        let claims = verifier.verify_access(&token).unwrap();
        assert_eq!(claims.email, "shopper@example.com");
        assert!(!claims.is_staff());
    }

    #[test]
    fn rejects_refresh_token_where_access_is_required() {
        let verifier = TokenVerifier::new(&config());
        let token = sign("test-secret", TokenType::Refresh, vec![]);
        let err = verifier.verify_access(&token).unwrap_err();
        assert!(matches!(
            err,
            TokenError::WrongType {
                expected: TokenType::Access
            }
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let verifier = TokenVerifier::new(&config());
        let token = sign("other-secret", TokenType::Access, vec![]);
        assert!(matches!(
            verifier.verify(&token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn admin_role_is_staff() {
        let verifier = TokenVerifier::new(&config());
        let token = sign("test-secret", TokenType::Access, vec!["admin".into()]);
        assert!(verifier.verify(&token).unwrap().is_staff());
    }
}
