//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Input failed a business rule
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Uniqueness or referential conflict
    #[error("{0}")]
    Conflict(String),

    /// Caller lacks the permission for an existing resource
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    /// Map a unique violation to [`ApiError::Conflict`] with `message`
    pub fn conflict_or(message: &str) -> impl FnOnce(DatabaseError) -> ApiError + '_ {
        move |e| {
            if e.is_conflict() {
                ApiError::Conflict(message.to_string())
            } else {
                ApiError::Database(e)
            }
        }
    }

    /// Map a value overflowing its column to [`ApiError::Validation`] with `message`
    pub fn out_of_range_or(message: &str) -> impl FnOnce(DatabaseError) -> ApiError + '_ {
        move |e| {
            if e.is_out_of_range() {
                ApiError::Validation(message.to_string())
            } else {
                ApiError::Database(e)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Database(DatabaseError::Conflict(constraint)) => (
                StatusCode::CONFLICT,
                format!("Duplicate value violates {}", constraint),
            ),
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_conflict_is_409_and_other_database_errors_500() {
        let conflict = ApiError::Database(DatabaseError::Conflict("products_sku_key".into()));
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let broken = ApiError::Database(DatabaseError::Configuration("bad".into()));
        assert_eq!(
            broken.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflict_or_only_rewrites_unique_violations() {
        let mapped = ApiError::conflict_or("taken")(DatabaseError::Conflict("x".into()));
        assert!(matches!(mapped, ApiError::Conflict(msg) if msg == "taken"));

        let mapped = ApiError::conflict_or("taken")(DatabaseError::Constraint("fk".into()));
        assert!(matches!(mapped, ApiError::Database(DatabaseError::Constraint(_))));
    }

    #[test]
    fn out_of_range_or_leaves_other_constraints_alone() {
        let overflow = DatabaseError::Constraint(common::error::OUT_OF_RANGE.into());
        let mapped = ApiError::out_of_range_or("too large")(overflow);
        assert!(matches!(mapped, ApiError::Validation(msg) if msg == "too large"));

        let mapped = ApiError::out_of_range_or("too large")(DatabaseError::Constraint("fk".into()));
        assert!(matches!(mapped, ApiError::Database(DatabaseError::Constraint(_))));
    }
}
