//! Product reviews and moderation

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{NewReview, Page, PageRequest, Review, ReviewChanges, ReviewView},
    repositories::{CatalogStore, OrderStore, ReviewStore},
};

const DUPLICATE_REVIEW: &str = "You have already reviewed this product";

fn check_rating(rating: i32) -> ApiResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReviewService {
    reviews: Arc<dyn ReviewStore>,
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            reviews,
            catalog,
            orders,
        }
    }

    async fn existing(&self, id: Uuid) -> ApiResult<Review> {
        self.reviews
            .get_review(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Review"))
    }

    /// Load a review the caller is allowed to change
    async fn owned(&self, caller: &AuthUser, id: Uuid) -> ApiResult<Review> {
        let review = self.existing(id).await?;
        if review.user_id != caller.id {
            return Err(ApiError::Forbidden(
                "You can only modify your own reviews".to_string(),
            ));
        }
        Ok(review)
    }

    pub async fn list_product_reviews(
        &self,
        product_id: Uuid,
        page: PageRequest,
    ) -> ApiResult<Page<ReviewView>> {
        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(ApiError::not_found("Product"));
        }
        let reviews = self.reviews.list_product_reviews(product_id).await?;
        Ok(Page::from_vec(reviews, page).map(ReviewView::from))
    }

    pub async fn list_user_reviews(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> ApiResult<Page<ReviewView>> {
        let reviews = self.reviews.list_user_reviews(user_id).await?;
        Ok(Page::from_vec(reviews, page).map(ReviewView::from))
    }

    pub async fn get_review(&self, id: Uuid) -> ApiResult<ReviewView> {
        Ok(self.existing(id).await?.into())
    }

    /// Create the caller's review of a product
    ///
    /// `product_id` comes from the path on nested routes and wins over the
    /// body. The verified purchase flag is derived from the caller's
    /// completed orders.
    pub async fn create_review(
        &self,
        caller: &AuthUser,
        product_id: Option<Uuid>,
        request: NewReview,
    ) -> ApiResult<ReviewView> {
        let product_id = product_id
            .or(request.product)
            .ok_or_else(|| ApiError::Validation("product is required".to_string()))?;
        check_rating(request.rating)?;

        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(ApiError::not_found("Product"));
        }
        let already_reviewed = self
            .reviews
            .list_user_reviews(caller.id)
            .await?
            .iter()
            .any(|r| r.product_id == product_id);
        if already_reviewed {
            return Err(ApiError::Conflict(DUPLICATE_REVIEW.to_string()));
        }

        let verified = self.orders.has_purchased(caller.id, product_id).await?;
        let review = self
            .reviews
            .create_review(
                caller.id,
                product_id,
                request.rating,
                &request.comment,
                verified,
            )
            .await
            .map_err(ApiError::conflict_or(DUPLICATE_REVIEW))?;

        info!(
            review_id = %review.id,
            product_id = %product_id,
            verified,
            "review created"
        );
        Ok(review.into())
    }

    pub async fn update_review(
        &self,
        caller: &AuthUser,
        id: Uuid,
        changes: ReviewChanges,
    ) -> ApiResult<ReviewView> {
        self.owned(caller, id).await?;
        if let Some(rating) = changes.rating {
            check_rating(rating)?;
        }
        self.reviews
            .update_review(id, &changes)
            .await?
            .map(ReviewView::from)
            .ok_or_else(|| ApiError::not_found("Review"))
    }

    pub async fn delete_review(&self, caller: &AuthUser, id: Uuid) -> ApiResult<()> {
        self.owned(caller, id).await?;
        if !self.reviews.delete_review(id).await? {
            return Err(ApiError::not_found("Review"));
        }
        Ok(())
    }

    /// Mark reviews as moderated; returns how many were updated
    pub async fn approve(&self, caller: &AuthUser, ids: &[Uuid]) -> ApiResult<u64> {
        caller.require_staff()?;
        let updated = self.reviews.approve_reviews(ids).await?;
        info!(requested = ids.len(), updated, "reviews approved");
        Ok(updated)
    }

    pub async fn set_verified_purchase(
        &self,
        caller: &AuthUser,
        id: Uuid,
        is_verified_purchase: bool,
    ) -> ApiResult<ReviewView> {
        caller.require_staff()?;
        self.reviews
            .set_verified_purchase(id, is_verified_purchase)
            .await?
            .map(ReviewView::from)
            .ok_or_else(|| ApiError::not_found("Review"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddCartItem, OrderChanges, PlaceOrder};
    use crate::repositories::MemoryStore;
    use crate::services::fixtures::{product, shopper, staff};
    use crate::services::{CartService, CatalogService, OrderService};

    struct Shop {
        catalog: CatalogService,
        carts: CartService,
        orders: OrderService,
        reviews: ReviewService,
    }

    fn shop() -> Shop {
        let store = Arc::new(MemoryStore::with_default_statuses());
        Shop {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), store.clone()),
            orders: OrderService::new(store.clone()),
            reviews: ReviewService::new(store.clone(), store.clone(), store),
        }
    }

    fn review(rating: i32) -> NewReview {
        NewReview {
            product: None,
            rating,
            comment: "Solid".to_string(),
        }
    }

    async fn mug(shop: &Shop) -> Uuid {
        shop.catalog
            .create_product(&staff(), product("MUG-1", "8.00"))
            .await
            .unwrap()
            .product
            .id
    }

    #[tokio::test]
    async fn rating_bounds_and_uniqueness() {
        let shop = shop();
        let product_id = mug(&shop).await;

        for rating in [0, 6] {
            let err = shop
                .reviews
                .create_review(&shopper(), Some(product_id), review(rating))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }

        for rating in [1, 5] {
            let created = shop
                .reviews
                .create_review(&shopper(), Some(product_id), review(rating))
                .await
                .unwrap();
            assert_eq!(created.review.rating, rating);
            assert!(!created.review.is_moderated);
        }

        let author = shopper();
        shop.reviews
            .create_review(&author, Some(product_id), review(4))
            .await
            .unwrap();
        let err = shop
            .reviews
            .create_review(&author, Some(product_id), review(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn product_must_exist_and_be_named() {
        let shop = shop();
        let err = shop
            .reviews
            .create_review(&shopper(), Some(Uuid::new_v4()), review(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = shop
            .reviews
            .create_review(&shopper(), None, review(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_author_may_change_a_review() {
        let shop = shop();
        let product_id = mug(&shop).await;
        let author = shopper();
        let created = shop
            .reviews
            .create_review(&author, Some(product_id), review(4))
            .await
            .unwrap();
        let id = created.review.id;

        let other = shopper();
        let changes = ReviewChanges {
            rating: Some(1),
            comment: Some("Terrible".to_string()),
        };
        let err = shop
            .reviews
            .update_review(&other, id, changes.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let err = shop.reviews.delete_review(&other, id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let unchanged = shop.reviews.get_review(id).await.unwrap();
        assert_eq!(unchanged.review.rating, 4);
        assert_eq!(unchanged.review.comment, "Solid");

        let updated = shop.reviews.update_review(&author, id, changes).await.unwrap();
        assert_eq!(updated.rating_stars, "★☆☆☆☆");
        shop.reviews.delete_review(&author, id).await.unwrap();
    }

    #[tokio::test]
    async fn verified_purchase_follows_completed_orders() {
        let shop = shop();
        let product_id = mug(&shop).await;
        let buyer = shopper();

        shop.carts
            .add_item(
                buyer.id,
                AddCartItem {
                    product_id,
                    quantity: 1,
                },
            )
            .await
            .unwrap();
        let order = shop
            .orders
            .place_order(buyer.id, PlaceOrder::default())
            .await
            .unwrap();

        let statuses = shop
            .orders
            .list_statuses(PageRequest { page: 1, page_size: 20 })
            .await
            .unwrap();
        let delivered = statuses
            .results
            .iter()
            .find(|s| s.name == "delivered")
            .unwrap();
        shop.orders
            .update_order(
                buyer.id,
                order.order.id,
                OrderChanges {
                    status: Some(delivered.id),
                    ..OrderChanges::default()
                },
            )
            .await
            .unwrap();

        let verified = shop
            .reviews
            .create_review(&buyer, Some(product_id), review(5))
            .await
            .unwrap();
        assert!(verified.review.is_verified_purchase);

        let unverified = shop
            .reviews
            .create_review(&shopper(), Some(product_id), review(5))
            .await
            .unwrap();
        assert!(!unverified.review.is_verified_purchase);

        let err = shop
            .reviews
            .set_verified_purchase(&buyer, unverified.review.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let flagged = shop
            .reviews
            .set_verified_purchase(&staff(), unverified.review.id, true)
            .await
            .unwrap();
        assert!(flagged.review.is_verified_purchase);
    }

    #[tokio::test]
    async fn staff_approve_in_bulk() {
        let shop = shop();
        let product_id = mug(&shop).await;
        let mut ids = Vec::new();
        for _ in 0..2 {
            let created = shop
                .reviews
                .create_review(&shopper(), Some(product_id), review(4))
                .await
                .unwrap();
            ids.push(created.review.id);
        }

        let err = shop.reviews.approve(&shopper(), &ids).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        ids.push(Uuid::new_v4());
        assert_eq!(shop.reviews.approve(&staff(), &ids).await.unwrap(), 2);
        let page = shop
            .reviews
            .list_product_reviews(product_id, PageRequest { page: 1, page_size: 20 })
            .await
            .unwrap();
        assert!(page.results.iter().all(|r| r.review.is_moderated));
    }
}
