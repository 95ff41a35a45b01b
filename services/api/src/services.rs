//! Business rules on top of the store traits
//!
//! Every service owns the stores it needs behind `Arc<dyn ..>` so the same
//! rules run against PostgreSQL in production and the in-memory store in
//! tests.

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod reviews;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use reviews::ReviewService;

use crate::error::{ApiError, ApiResult};

/// Reject an empty or whitespace-only field
fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(format!("{} must not be blank", field)))
    } else {
        Ok(())
    }
}
