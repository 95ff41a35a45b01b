//! PostgreSQL review repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use super::{PgStore, ReviewStore};
use crate::models::{Review, ReviewChanges};

const REVIEW_COLUMNS: &str = "id, user_id, product_id, rating, comment, is_moderated, \
                              is_verified_purchase, created_at, updated_at";

#[async_trait]
impl ReviewStore for PgStore {
    async fn list_product_reviews(&self, product_id: Uuid) -> DatabaseResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn list_user_reviews(&self, user_id: Uuid) -> DatabaseResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn get_review(&self, id: Uuid) -> DatabaseResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn create_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rating: i32,
        comment: &str,
        is_verified_purchase: bool,
    ) -> DatabaseResult<Review> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews (user_id, product_id, rating, comment, is_verified_purchase)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .bind(is_verified_purchase)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn update_review(
        &self,
        id: Uuid,
        changes: &ReviewChanges,
    ) -> DatabaseResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET rating = COALESCE($2, rating),
                comment = COALESCE($3, comment),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.rating)
        .bind(&changes.comment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn delete_review(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn approve_reviews(&self, ids: &[Uuid]) -> DatabaseResult<u64> {
        let result = sqlx::query(
            "UPDATE reviews SET is_moderated = TRUE, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_verified_purchase(
        &self,
        id: Uuid,
        is_verified_purchase: bool,
    ) -> DatabaseResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET is_verified_purchase = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(is_verified_purchase)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }
}
