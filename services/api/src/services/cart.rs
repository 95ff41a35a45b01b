//! Shopping cart rules

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{AddCartItem, Cart, CartItemView, CartView, UpdateCartItem},
    repositories::{CartStore, CatalogStore},
};

fn check_quantity(quantity: i32) -> ApiResult<()> {
    if quantity < 1 {
        return Err(ApiError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { carts, catalog }
    }

    /// The caller's cart, created on first use
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> ApiResult<Cart> {
        Ok(self.carts.get_or_create_cart(user_id).await?)
    }

    async fn existing_cart(&self, user_id: Uuid) -> ApiResult<Cart> {
        self.carts
            .find_cart(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Cart item"))
    }

    pub async fn cart_view(&self, user_id: Uuid) -> ApiResult<CartView> {
        let cart = self.get_or_create_cart(user_id).await?;
        let lines = self.carts.cart_lines(cart.id).await?;
        Ok(CartView::new(cart, lines))
    }

    /// Remove every line; the cart itself is kept
    pub async fn clear(&self, user_id: Uuid) -> ApiResult<()> {
        if let Some(cart) = self.carts.find_cart(user_id).await? {
            let removed = self.carts.clear_cart(cart.id).await?;
            debug!(cart_id = %cart.id, removed, "cart cleared");
        }
        Ok(())
    }

    pub async fn list_items(&self, user_id: Uuid) -> ApiResult<Vec<CartItemView>> {
        let cart = self.get_or_create_cart(user_id).await?;
        let lines = self.carts.cart_lines(cart.id).await?;
        Ok(lines.into_iter().map(CartItemView::from).collect())
    }

    /// Add a product, merging with an existing line for the same product
    pub async fn add_item(&self, user_id: Uuid, request: AddCartItem) -> ApiResult<CartItemView> {
        check_quantity(request.quantity)?;

        let product = self
            .catalog
            .get_product(request.product_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product"))?;
        if !product.is_active {
            return Err(ApiError::Validation(
                "product is not available".to_string(),
            ));
        }

        let cart = self.get_or_create_cart(user_id).await?;
        let item = self
            .carts
            .add_item(cart.id, product.id, request.quantity)
            .await
            .map_err(ApiError::out_of_range_or("quantity is too large"))?;
        info!(
            cart_id = %cart.id,
            product_id = %product.id,
            quantity = item.quantity,
            "cart item added"
        );

        self.get_item(user_id, item.id).await
    }

    pub async fn get_item(&self, user_id: Uuid, item_id: Uuid) -> ApiResult<CartItemView> {
        let cart = self.existing_cart(user_id).await?;
        self.carts
            .get_item(cart.id, item_id)
            .await?
            .map(CartItemView::from)
            .ok_or_else(|| ApiError::not_found("Cart item"))
    }

    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        request: UpdateCartItem,
    ) -> ApiResult<CartItemView> {
        check_quantity(request.quantity)?;
        let cart = self.existing_cart(user_id).await?;
        self.carts
            .set_item_quantity(cart.id, item_id, request.quantity)
            .await?
            .ok_or_else(|| ApiError::not_found("Cart item"))?;
        self.get_item(user_id, item_id).await
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> ApiResult<()> {
        let cart = self.existing_cart(user_id).await?;
        if !self.carts.remove_item(cart.id, item_id).await? {
            return Err(ApiError::not_found("Cart item"));
        }
        Ok(())
    }
}
