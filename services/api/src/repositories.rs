//! Repositories for database operations
//!
//! Every aggregate is reached through a trait so the services can run
//! against PostgreSQL ([`PgStore`]) or the in-memory [`MemoryStore`].

use async_trait::async_trait;
use common::error::DatabaseResult;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Cart, CartItem, CartLine, Category, CategoryChanges, ImageChanges, NewCategory, NewImage,
    NewOrder, NewOrderItem, NewOrderStatus, NewProduct, Order, OrderChanges, OrderItem,
    OrderStatus, OrderStatusChanges, PageRequest, Product, ProductChanges, ProductFilter,
    ProductImage, Review, ReviewChanges,
};

pub mod cart;
pub mod catalog;
pub mod memory;
pub mod orders;
pub mod reviews;

pub use memory::MemoryStore;

/// PostgreSQL implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All categories ordered by name
    async fn list_categories(&self) -> DatabaseResult<Vec<Category>>;

    async fn get_category(&self, id: Uuid) -> DatabaseResult<Option<Category>>;

    async fn create_category(&self, new_category: &NewCategory) -> DatabaseResult<Category>;

    async fn update_category(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
    ) -> DatabaseResult<Option<Category>>;

    /// Children are detached, not deleted
    async fn delete_category(&self, id: Uuid) -> DatabaseResult<bool>;

    /// One filtered page of products and the total number of matches
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> DatabaseResult<(Vec<Product>, i64)>;

    async fn get_product(&self, id: Uuid) -> DatabaseResult<Option<Product>>;

    /// Insert the product and its category links in one transaction
    async fn create_product(&self, new_product: &NewProduct) -> DatabaseResult<Product>;

    async fn update_product(
        &self,
        id: Uuid,
        changes: &ProductChanges,
    ) -> DatabaseResult<Option<Product>>;

    async fn delete_product(&self, id: Uuid) -> DatabaseResult<bool>;

    async fn product_categories(&self, product_id: Uuid) -> DatabaseResult<Vec<Category>>;

    /// Images, main image first then oldest first
    async fn list_images(&self, product_id: Option<Uuid>) -> DatabaseResult<Vec<ProductImage>>;

    async fn get_image(&self, id: Uuid) -> DatabaseResult<Option<ProductImage>>;

    /// A main image demotes the product's other images in the same transaction
    async fn create_image(&self, new_image: &NewImage) -> DatabaseResult<ProductImage>;

    async fn update_image(
        &self,
        id: Uuid,
        changes: &ImageChanges,
    ) -> DatabaseResult<Option<ProductImage>>;

    async fn delete_image(&self, id: Uuid) -> DatabaseResult<bool>;

    async fn health_check(&self) -> bool;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Idempotent; never creates a second cart for a user
    async fn get_or_create_cart(&self, user_id: Uuid) -> DatabaseResult<Cart>;

    async fn find_cart(&self, user_id: Uuid) -> DatabaseResult<Option<Cart>>;

    /// Insert the line or add `quantity` to the existing one atomically
    async fn add_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> DatabaseResult<CartItem>;

    async fn get_item(&self, cart_id: Uuid, item_id: Uuid) -> DatabaseResult<Option<CartLine>>;

    async fn set_item_quantity(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> DatabaseResult<Option<CartItem>>;

    async fn remove_item(&self, cart_id: Uuid, item_id: Uuid) -> DatabaseResult<bool>;

    /// Delete every line, keeping the cart
    async fn clear_cart(&self, cart_id: Uuid) -> DatabaseResult<u64>;

    /// Lines joined with current product data, oldest first
    async fn cart_lines(&self, cart_id: Uuid) -> DatabaseResult<Vec<CartLine>>;
}

/// Unit of work for turning a cart into an order
///
/// Dropping the value without calling [`CheckoutTx::commit`] discards every
/// write made through it.
#[async_trait]
pub trait CheckoutTx: Send {
    /// Lock and return the user's cart lines; empty when there is no cart
    async fn lock_cart_lines(&mut self, user_id: Uuid) -> DatabaseResult<Vec<CartLine>>;

    async fn insert_order(&mut self, new_order: &NewOrder) -> DatabaseResult<Order>;

    async fn insert_order_item(&mut self, new_item: &NewOrderItem) -> DatabaseResult<OrderItem>;

    async fn set_order_total(&mut self, order_id: Uuid, total: Decimal) -> DatabaseResult<Order>;

    async fn clear_cart(&mut self, cart_id: Uuid) -> DatabaseResult<u64>;

    async fn commit(self: Box<Self>) -> DatabaseResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Statuses, oldest first
    async fn list_statuses(&self) -> DatabaseResult<Vec<OrderStatus>>;

    async fn get_status(&self, id: Uuid) -> DatabaseResult<Option<OrderStatus>>;

    /// Earliest-created status that is not final
    async fn default_status(&self) -> DatabaseResult<Option<OrderStatus>>;

    async fn create_status(&self, new_status: &NewOrderStatus) -> DatabaseResult<OrderStatus>;

    async fn update_status(
        &self,
        id: Uuid,
        changes: &OrderStatusChanges,
    ) -> DatabaseResult<Option<OrderStatus>>;

    /// Fails with a constraint error while orders reference the status
    async fn delete_status(&self, id: Uuid) -> DatabaseResult<bool>;

    /// The user's orders, newest first
    async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> DatabaseResult<(Vec<Order>, i64)>;

    async fn get_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<Order>>;

    async fn update_order(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: &OrderChanges,
    ) -> DatabaseResult<Option<Order>>;

    async fn delete_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<bool>;

    async fn order_items(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>>;

    /// Every order line of the user's orders, newest first
    async fn list_order_items(&self, user_id: Uuid) -> DatabaseResult<Vec<OrderItem>>;

    async fn get_order_item(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<OrderItem>>;

    /// True when an order in a final status contains the product
    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> DatabaseResult<bool>;

    async fn begin_checkout(&self) -> DatabaseResult<Box<dyn CheckoutTx>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// A product's reviews, newest first
    async fn list_product_reviews(&self, product_id: Uuid) -> DatabaseResult<Vec<Review>>;

    /// A user's reviews, newest first
    async fn list_user_reviews(&self, user_id: Uuid) -> DatabaseResult<Vec<Review>>;

    async fn get_review(&self, id: Uuid) -> DatabaseResult<Option<Review>>;

    /// Conflict when the user already reviewed the product
    async fn create_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rating: i32,
        comment: &str,
        is_verified_purchase: bool,
    ) -> DatabaseResult<Review>;

    async fn update_review(
        &self,
        id: Uuid,
        changes: &ReviewChanges,
    ) -> DatabaseResult<Option<Review>>;

    async fn delete_review(&self, id: Uuid) -> DatabaseResult<bool>;

    /// Mark reviews moderated, returning how many rows changed
    async fn approve_reviews(&self, ids: &[Uuid]) -> DatabaseResult<u64>;

    async fn set_verified_purchase(
        &self,
        id: Uuid,
        is_verified_purchase: bool,
    ) -> DatabaseResult<Option<Review>>;
}
