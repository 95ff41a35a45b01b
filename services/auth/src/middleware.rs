//! Bearer token extraction for authenticated routes

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    state::AppState,
};

/// Caller identity taken from a valid access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(|r| r == common::token::STAFF_ROLE)
    }

    pub fn require_staff(&self) -> AuthResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AuthError::staff_only())
        }
    }

    /// The caller must be `user_id` or staff
    pub fn require_self_or_staff(&self, user_id: Uuid) -> AuthResult<()> {
        if self.id == user_id || self.is_staff() {
            Ok(())
        } else {
            Err(AuthError::NotFound("User not found".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::Unauthorized(
                        "Authentication credentials were not provided".to_string(),
                    )
                })?;

        let claims = state
            .jwt_service
            .validate_access_token(bearer.token())
            .map_err(|e| {
                warn!(error = %e, "rejected access token");
                AuthError::Unauthorized("Invalid or expired token".to_string())
            })?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            roles: claims.roles,
        })
    }
}
