//! Product reviews

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "product")]
    pub product_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub is_moderated: bool,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Filled stars for the rating followed by empty ones, five in total
    pub fn rating_stars(&self) -> String {
        let filled = self.rating.clamp(0, 5) as usize;
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

/// Review payload; `product` is taken from the path when nested
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub product: Option<Uuid>,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewChanges {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveReviews {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetVerifiedPurchase {
    pub is_verified_purchase: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub rating_stars: String,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        let rating_stars = review.rating_stars();
        Self {
            review,
            rating_stars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_stars() {
        let review = Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            rating: 3,
            comment: String::new(),
            is_moderated: false,
            is_verified_purchase: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(review.rating_stars(), "★★★☆☆");
    }
}
