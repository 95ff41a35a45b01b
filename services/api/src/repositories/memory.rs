//! In-memory store used by tests and local runs without a database
//!
//! Unique, foreign key and check constraints of the schema are reproduced
//! so the services see the same errors they would get from PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult, OUT_OF_RANGE};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::orders::CANCELLED_STATUS;
use super::{CartStore, CatalogStore, CheckoutTx, OrderStore, ReviewStore};
use crate::models::{
    Cart, CartItem, CartLine, Category, CategoryChanges, ImageChanges, NewCategory, NewImage,
    NewOrder, NewOrderItem, NewOrderStatus, NewProduct, Order, OrderChanges, OrderItem,
    OrderStatus, OrderStatusChanges, PageRequest, Product, ProductChanges, ProductFilter,
    ProductImage, ProductOrdering, ProductSummary, Review, ReviewChanges, max_money,
};

fn conflict(constraint: &str) -> DatabaseError {
    DatabaseError::Conflict(constraint.to_string())
}

fn violation(constraint: &str) -> DatabaseError {
    DatabaseError::Constraint(constraint.to_string())
}

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: Vec<Category>,
    products: Vec<Product>,
    /// (product_id, category_id)
    product_categories: Vec<(Uuid, Uuid)>,
    images: Vec<ProductImage>,
    carts: Vec<Cart>,
    cart_items: Vec<CartItem>,
    statuses: Vec<OrderStatus>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    reviews: Vec<Review>,
}

impl Tables {
    fn line(&self, item: &CartItem) -> Option<CartLine> {
        self.products
            .iter()
            .find(|p| p.id == item.product_id)
            .map(|product| CartLine {
                item: item.clone(),
                product: ProductSummary {
                    id: product.id,
                    name: product.name.clone(),
                    sku: product.sku.clone(),
                    price: product.price,
                    is_active: product.is_active,
                },
            })
    }

    fn lines(&self, cart_id: Uuid) -> Vec<CartLine> {
        self.cart_items
            .iter()
            .filter(|item| item.cart_id == cart_id)
            .filter_map(|item| self.line(item))
            .collect()
    }

    fn clear_cart(&mut self, cart_id: Uuid) -> u64 {
        let before = self.cart_items.len();
        self.cart_items.retain(|item| item.cart_id != cart_id);
        (before - self.cart_items.len()) as u64
    }

    fn check_categories_exist(&self, category_ids: &[Uuid]) -> DatabaseResult<()> {
        if category_ids
            .iter()
            .all(|id| self.categories.iter().any(|c| c.id == *id))
        {
            Ok(())
        } else {
            Err(violation("product_categories_category_id_fkey"))
        }
    }

    fn link_categories(&mut self, product_id: Uuid, category_ids: &[Uuid]) {
        self.product_categories.retain(|(p, _)| *p != product_id);
        for category_id in category_ids {
            if !self.product_categories.contains(&(product_id, *category_id)) {
                self.product_categories.push((product_id, *category_id));
            }
        }
    }

    fn product_matches(&self, product: &Product, filter: &ProductFilter) -> bool {
        if filter.min_price.is_some_and(|min| product.price < min) {
            return false;
        }
        if filter.max_price.is_some_and(|max| product.price > max) {
            return false;
        }
        if filter.is_active.is_some_and(|active| product.is_active != active) {
            return false;
        }
        if let Some(category) = filter.category {
            if !self.product_categories.contains(&(product.id, category)) {
                return false;
            }
        }
        if let Some(term) = filter.search_term() {
            let term = term.to_lowercase();
            let hit = [&product.name, &product.description, &product.sku]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }

    fn demote_main_images(&mut self, product_id: Uuid, keep: Option<Uuid>) {
        for image in self
            .images
            .iter_mut()
            .filter(|i| i.product_id == product_id && Some(i.id) != keep)
        {
            image.is_main = false;
        }
    }

    fn insert_order(&mut self, new_order: &NewOrder) -> DatabaseResult<Order> {
        if !self.statuses.iter().any(|s| s.id == new_order.status_id) {
            return Err(violation("orders_status_id_fkey"));
        }
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: new_order.user_id,
            status_id: new_order.status_id,
            total: Decimal::ZERO,
            shipping_address: new_order.shipping_address.clone(),
            notes: new_order.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.orders.push(order.clone());
        Ok(order)
    }

    fn insert_order_item(&mut self, new_item: &NewOrderItem) -> DatabaseResult<OrderItem> {
        if !self.orders.iter().any(|o| o.id == new_item.order_id) {
            return Err(violation("order_items_order_id_fkey"));
        }
        if !self.products.iter().any(|p| p.id == new_item.product_id) {
            return Err(violation("order_items_product_id_fkey"));
        }
        if new_item.quantity < 1 {
            return Err(violation("order_items_quantity_check"));
        }
        let item = OrderItem {
            id: Uuid::new_v4(),
            order_id: new_item.order_id,
            product_id: Some(new_item.product_id),
            product_name: new_item.product_name.clone(),
            product_sku: new_item.product_sku.clone(),
            price: new_item.price,
            quantity: new_item.quantity,
            created_at: Utc::now(),
        };
        self.order_items.push(item.clone());
        Ok(item)
    }

    fn set_order_total(&mut self, order_id: Uuid, total: Decimal) -> DatabaseResult<Order> {
        if total > max_money() {
            return Err(violation(OUT_OF_RANGE));
        }
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| DatabaseError::Query(sqlx::Error::RowNotFound))?;
        order.total = total;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

fn sort_products(products: &mut Vec<Product>, ordering: ProductOrdering) {
    match ordering {
        ProductOrdering::Price => {
            products.reverse();
            products.sort_by_key(|p| p.price);
        }
        ProductOrdering::PriceDesc => {
            products.reverse();
            products.sort_by_key(|p| Reverse(p.price));
        }
        ProductOrdering::CreatedAt => products.sort_by_key(|p| p.created_at),
        ProductOrdering::CreatedAtDesc => {
            products.reverse();
            products.sort_by_key(|p| Reverse(p.created_at));
        }
        ProductOrdering::Name => products.sort_by(|a, b| a.name.cmp(&b.name)),
        ProductOrdering::NameDesc => products.sort_by(|a, b| b.name.cmp(&a.name)),
    }
}

/// Every store trait over one shared set of tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the same order statuses as the migrations
    pub fn with_default_statuses() -> Self {
        let seeds = [
            ("new", "Order placed, awaiting processing", false),
            ("processing", "Order is being prepared", false),
            ("shipped", "Order handed to the carrier", false),
            ("delivered", "Order delivered to the customer", true),
            (CANCELLED_STATUS, "Order cancelled", true),
        ];
        let now = Utc::now();
        let statuses = seeds
            .iter()
            .enumerate()
            .map(|(offset, (name, description, is_final))| OrderStatus {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: description.to_string(),
                is_final: *is_final,
                created_at: now + chrono::Duration::seconds(offset as i64),
            })
            .collect();
        let tables = Tables {
            statuses,
            ..Tables::default()
        };
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> DatabaseResult<Vec<Category>> {
        let tables = self.tables.lock().await;
        let mut categories = tables.categories.clone();
        categories.sort_by(|a, b| (&a.name, a.created_at).cmp(&(&b.name, b.created_at)));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> DatabaseResult<Option<Category>> {
        let tables = self.tables.lock().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, new_category: &NewCategory) -> DatabaseResult<Category> {
        let mut tables = self.tables.lock().await;
        if let Some(parent) = new_category.parent {
            if !tables.categories.iter().any(|c| c.id == parent) {
                return Err(violation("categories_parent_id_fkey"));
            }
        }
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: new_category.name.clone(),
            description: new_category.description.clone(),
            parent_id: new_category.parent,
            is_active: new_category.is_active,
            created_at: now,
            updated_at: now,
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
    ) -> DatabaseResult<Option<Category>> {
        let mut tables = self.tables.lock().await;
        if let Some(Some(parent)) = changes.parent {
            if parent == id {
                return Err(violation("categories_not_own_parent"));
            }
            if !tables.categories.iter().any(|c| c.id == parent) {
                return Err(violation("categories_parent_id_fkey"));
            }
        }
        let Some(category) = tables.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            category.name = name.clone();
        }
        if let Some(description) = &changes.description {
            category.description = description.clone();
        }
        if let Some(parent) = changes.parent {
            category.parent_id = parent;
        }
        if let Some(is_active) = changes.is_active {
            category.is_active = is_active;
        }
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        if tables.categories.len() == before {
            return Ok(false);
        }
        for child in tables
            .categories
            .iter_mut()
            .filter(|c| c.parent_id == Some(id))
        {
            child.parent_id = None;
        }
        tables.product_categories.retain(|(_, c)| *c != id);
        Ok(true)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> DatabaseResult<(Vec<Product>, i64)> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| tables.product_matches(p, filter))
            .cloned()
            .collect();
        sort_products(&mut products, filter.ordering());

        let count = products.len() as i64;
        let results = products
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((results, count))
    }

    async fn get_product(&self, id: Uuid) -> DatabaseResult<Option<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, new_product: &NewProduct) -> DatabaseResult<Product> {
        let mut tables = self.tables.lock().await;
        if new_product.price < Decimal::ZERO {
            return Err(violation("products_price_check"));
        }
        if tables.products.iter().any(|p| p.sku == new_product.sku) {
            return Err(conflict("products_sku_key"));
        }
        tables.check_categories_exist(&new_product.category_ids)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: new_product.name.clone(),
            description: new_product.description.clone(),
            price: new_product.price,
            sku: new_product.sku.clone(),
            is_active: new_product.is_active,
            created_at: now,
            updated_at: now,
        };
        tables.products.push(product.clone());
        tables.link_categories(product.id, &new_product.category_ids);
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: &ProductChanges,
    ) -> DatabaseResult<Option<Product>> {
        let mut tables = self.tables.lock().await;
        if !tables.products.iter().any(|p| p.id == id) {
            return Ok(None);
        }
        if changes.price.is_some_and(|price| price < Decimal::ZERO) {
            return Err(violation("products_price_check"));
        }
        if let Some(sku) = &changes.sku {
            if tables.products.iter().any(|p| p.id != id && &p.sku == sku) {
                return Err(conflict("products_sku_key"));
            }
        }
        if let Some(category_ids) = &changes.category_ids {
            tables.check_categories_exist(category_ids)?;
            tables.link_categories(id, category_ids);
        }

        let Some(product) = tables.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            product.name = name.clone();
        }
        if let Some(description) = &changes.description {
            product.description = description.clone();
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(sku) = &changes.sku {
            product.sku = sku.clone();
        }
        if let Some(is_active) = changes.is_active {
            product.is_active = is_active;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        if tables.products.len() == before {
            return Ok(false);
        }
        tables.product_categories.retain(|(p, _)| *p != id);
        tables.images.retain(|i| i.product_id != id);
        tables.cart_items.retain(|i| i.product_id != id);
        tables.reviews.retain(|r| r.product_id != id);
        for item in tables
            .order_items
            .iter_mut()
            .filter(|i| i.product_id == Some(id))
        {
            item.product_id = None;
        }
        Ok(true)
    }

    async fn product_categories(&self, product_id: Uuid) -> DatabaseResult<Vec<Category>> {
        let tables = self.tables.lock().await;
        let mut categories: Vec<Category> = tables
            .categories
            .iter()
            .filter(|c| tables.product_categories.contains(&(product_id, c.id)))
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_images(&self, product_id: Option<Uuid>) -> DatabaseResult<Vec<ProductImage>> {
        let tables = self.tables.lock().await;
        let mut images: Vec<ProductImage> = tables
            .images
            .iter()
            .filter(|i| product_id.is_none_or(|p| i.product_id == p))
            .cloned()
            .collect();
        images.sort_by_key(|i| (Reverse(i.is_main), i.created_at));
        Ok(images)
    }

    async fn get_image(&self, id: Uuid) -> DatabaseResult<Option<ProductImage>> {
        let tables = self.tables.lock().await;
        Ok(tables.images.iter().find(|i| i.id == id).cloned())
    }

    async fn create_image(&self, new_image: &NewImage) -> DatabaseResult<ProductImage> {
        let mut tables = self.tables.lock().await;
        if !tables.products.iter().any(|p| p.id == new_image.product) {
            return Err(violation("product_images_product_id_fkey"));
        }
        if new_image.is_main {
            tables.demote_main_images(new_image.product, None);
        }
        let image = ProductImage {
            id: Uuid::new_v4(),
            product_id: new_image.product,
            image: new_image.image.clone(),
            is_main: new_image.is_main,
            alt_text: new_image.alt_text.clone(),
            created_at: Utc::now(),
        };
        tables.images.push(image.clone());
        Ok(image)
    }

    async fn update_image(
        &self,
        id: Uuid,
        changes: &ImageChanges,
    ) -> DatabaseResult<Option<ProductImage>> {
        let mut tables = self.tables.lock().await;
        let Some(product_id) = tables
            .images
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.product_id)
        else {
            return Ok(None);
        };
        if changes.is_main == Some(true) {
            tables.demote_main_images(product_id, Some(id));
        }

        let Some(image) = tables.images.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(path) = &changes.image {
            image.image = path.clone();
        }
        if let Some(is_main) = changes.is_main {
            image.is_main = is_main;
        }
        if let Some(alt_text) = &changes.alt_text {
            image.alt_text = alt_text.clone();
        }
        Ok(Some(image.clone()))
    }

    async fn delete_image(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.images.len();
        tables.images.retain(|i| i.id != id);
        Ok(tables.images.len() < before)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_or_create_cart(&self, user_id: Uuid) -> DatabaseResult<Cart> {
        let mut tables = self.tables.lock().await;
        if let Some(cart) = tables.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        tables.carts.push(cart.clone());
        Ok(cart)
    }

    async fn find_cart(&self, user_id: Uuid) -> DatabaseResult<Option<Cart>> {
        let tables = self.tables.lock().await;
        Ok(tables.carts.iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn add_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> DatabaseResult<CartItem> {
        let mut tables = self.tables.lock().await;
        if !tables.carts.iter().any(|c| c.id == cart_id) {
            return Err(violation("cart_items_cart_id_fkey"));
        }
        if !tables.products.iter().any(|p| p.id == product_id) {
            return Err(violation("cart_items_product_id_fkey"));
        }

        let now = Utc::now();
        let existing = tables
            .cart_items
            .iter()
            .position(|i| i.cart_id == cart_id && i.product_id == product_id);
        let item = match existing {
            Some(index) => {
                let item = &mut tables.cart_items[index];
                let Some(merged) = item.quantity.checked_add(quantity) else {
                    return Err(violation(OUT_OF_RANGE));
                };
                if merged < 1 {
                    return Err(violation("cart_items_quantity_check"));
                }
                item.quantity = merged;
                item.updated_at = now;
                item.clone()
            }
            None => {
                if quantity < 1 {
                    return Err(violation("cart_items_quantity_check"));
                }
                let item = CartItem {
                    id: Uuid::new_v4(),
                    cart_id,
                    product_id,
                    quantity,
                    created_at: now,
                    updated_at: now,
                };
                tables.cart_items.push(item.clone());
                item
            }
        };

        if let Some(cart) = tables.carts.iter_mut().find(|c| c.id == cart_id) {
            cart.updated_at = now;
        }
        Ok(item)
    }

    async fn get_item(&self, cart_id: Uuid, item_id: Uuid) -> DatabaseResult<Option<CartLine>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.id == item_id)
            .and_then(|item| tables.line(item)))
    }

    async fn set_item_quantity(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> DatabaseResult<Option<CartItem>> {
        let mut tables = self.tables.lock().await;
        let Some(item) = tables
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == cart_id && i.id == item_id)
        else {
            return Ok(None);
        };
        if quantity < 1 {
            return Err(violation("cart_items_quantity_check"));
        }
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn remove_item(&self, cart_id: Uuid, item_id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|i| !(i.cart_id == cart_id && i.id == item_id));
        Ok(tables.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> DatabaseResult<u64> {
        let mut tables = self.tables.lock().await;
        Ok(tables.clear_cart(cart_id))
    }

    async fn cart_lines(&self, cart_id: Uuid) -> DatabaseResult<Vec<CartLine>> {
        let tables = self.tables.lock().await;
        Ok(tables.lines(cart_id))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_statuses(&self) -> DatabaseResult<Vec<OrderStatus>> {
        let tables = self.tables.lock().await;
        let mut statuses = tables.statuses.clone();
        statuses.sort_by_key(|s| s.created_at);
        Ok(statuses)
    }

    async fn get_status(&self, id: Uuid) -> DatabaseResult<Option<OrderStatus>> {
        let tables = self.tables.lock().await;
        Ok(tables.statuses.iter().find(|s| s.id == id).cloned())
    }

    async fn default_status(&self) -> DatabaseResult<Option<OrderStatus>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .statuses
            .iter()
            .filter(|s| !s.is_final)
            .min_by_key(|s| s.created_at)
            .cloned())
    }

    async fn create_status(&self, new_status: &NewOrderStatus) -> DatabaseResult<OrderStatus> {
        let mut tables = self.tables.lock().await;
        if tables.statuses.iter().any(|s| s.name == new_status.name) {
            return Err(conflict("order_statuses_name_key"));
        }
        let status = OrderStatus {
            id: Uuid::new_v4(),
            name: new_status.name.clone(),
            description: new_status.description.clone(),
            is_final: new_status.is_final,
            created_at: Utc::now(),
        };
        tables.statuses.push(status.clone());
        Ok(status)
    }

    async fn update_status(
        &self,
        id: Uuid,
        changes: &OrderStatusChanges,
    ) -> DatabaseResult<Option<OrderStatus>> {
        let mut tables = self.tables.lock().await;
        if let Some(name) = &changes.name {
            if tables.statuses.iter().any(|s| s.id != id && &s.name == name) {
                return Err(conflict("order_statuses_name_key"));
            }
        }
        let Some(status) = tables.statuses.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            status.name = name.clone();
        }
        if let Some(description) = &changes.description {
            status.description = description.clone();
        }
        if let Some(is_final) = changes.is_final {
            status.is_final = is_final;
        }
        Ok(Some(status.clone()))
    }

    async fn delete_status(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.orders.iter().any(|o| o.status_id == id) {
            return Err(violation("orders_status_id_fkey"));
        }
        let before = tables.statuses.len();
        tables.statuses.retain(|s| s.id != id);
        Ok(tables.statuses.len() < before)
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> DatabaseResult<(Vec<Order>, i64)> {
        let tables = self.tables.lock().await;
        let orders: Vec<Order> = tables
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        let count = orders.len() as i64;
        let results = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok((results, count))
    }

    async fn get_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.id == id && o.user_id == user_id)
            .cloned())
    }

    async fn update_order(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: &OrderChanges,
    ) -> DatabaseResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        if let Some(status) = changes.status {
            if !tables.statuses.iter().any(|s| s.id == status) {
                return Err(violation("orders_status_id_fkey"));
            }
        }
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.user_id == user_id)
        else {
            return Ok(None);
        };
        if let Some(status) = changes.status {
            order.status_id = status;
        }
        if let Some(address) = &changes.shipping_address {
            order.shipping_address = address.clone();
        }
        if let Some(notes) = &changes.notes {
            order.notes = notes.clone();
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn delete_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.orders.len();
        tables.orders.retain(|o| !(o.id == id && o.user_id == user_id));
        if tables.orders.len() == before {
            return Ok(false);
        }
        tables.order_items.retain(|i| i.order_id != id);
        Ok(true)
    }

    async fn order_items(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_order_items(&self, user_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .order_items
            .iter()
            .rev()
            .filter(|i| {
                tables
                    .orders
                    .iter()
                    .any(|o| o.id == i.order_id && o.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn get_order_item(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<OrderItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .order_items
            .iter()
            .find(|i| {
                i.id == id
                    && tables
                        .orders
                        .iter()
                        .any(|o| o.id == i.order_id && o.user_id == user_id)
            })
            .cloned())
    }

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> DatabaseResult<bool> {
        let tables = self.tables.lock().await;
        let completed = |order: &Order| {
            tables
                .statuses
                .iter()
                .any(|s| s.id == order.status_id && s.is_final && s.name != CANCELLED_STATUS)
        };
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && completed(o))
            .any(|o| {
                tables
                    .order_items
                    .iter()
                    .any(|i| i.order_id == o.id && i.product_id == Some(product_id))
            }))
    }

    async fn begin_checkout(&self) -> DatabaseResult<Box<dyn CheckoutTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryCheckout { guard, working }))
    }
}

/// Checkout holding the store lock; writes land in `working` until commit
pub struct MemoryCheckout {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl CheckoutTx for MemoryCheckout {
    async fn lock_cart_lines(&mut self, user_id: Uuid) -> DatabaseResult<Vec<CartLine>> {
        Ok(self
            .working
            .carts
            .iter()
            .find(|c| c.user_id == user_id)
            .map(|cart| self.working.lines(cart.id))
            .unwrap_or_default())
    }

    async fn insert_order(&mut self, new_order: &NewOrder) -> DatabaseResult<Order> {
        self.working.insert_order(new_order)
    }

    async fn insert_order_item(&mut self, new_item: &NewOrderItem) -> DatabaseResult<OrderItem> {
        self.working.insert_order_item(new_item)
    }

    async fn set_order_total(&mut self, order_id: Uuid, total: Decimal) -> DatabaseResult<Order> {
        self.working.set_order_total(order_id, total)
    }

    async fn clear_cart(&mut self, cart_id: Uuid) -> DatabaseResult<u64> {
        Ok(self.working.clear_cart(cart_id))
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        let MemoryCheckout { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn list_product_reviews(&self, product_id: Uuid) -> DatabaseResult<Vec<Review>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .rev()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn list_user_reviews(&self, user_id: Uuid) -> DatabaseResult<Vec<Review>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_review(&self, id: Uuid) -> DatabaseResult<Option<Review>> {
        let tables = self.tables.lock().await;
        Ok(tables.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn create_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rating: i32,
        comment: &str,
        is_verified_purchase: bool,
    ) -> DatabaseResult<Review> {
        let mut tables = self.tables.lock().await;
        if !tables.products.iter().any(|p| p.id == product_id) {
            return Err(violation("reviews_product_id_fkey"));
        }
        if !(1..=5).contains(&rating) {
            return Err(violation("reviews_rating_check"));
        }
        if tables
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.product_id == product_id)
        {
            return Err(conflict("reviews_user_product_key"));
        }
        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            rating,
            comment: comment.to_string(),
            is_moderated: false,
            is_verified_purchase,
            created_at: now,
            updated_at: now,
        };
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn update_review(
        &self,
        id: Uuid,
        changes: &ReviewChanges,
    ) -> DatabaseResult<Option<Review>> {
        let mut tables = self.tables.lock().await;
        if changes.rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(violation("reviews_rating_check"));
        }
        let Some(review) = tables.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(rating) = changes.rating {
            review.rating = rating;
        }
        if let Some(comment) = &changes.comment {
            review.comment = comment.clone();
        }
        review.updated_at = Utc::now();
        Ok(Some(review.clone()))
    }

    async fn delete_review(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.reviews.len();
        tables.reviews.retain(|r| r.id != id);
        Ok(tables.reviews.len() < before)
    }

    async fn approve_reviews(&self, ids: &[Uuid]) -> DatabaseResult<u64> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut updated = 0;
        for review in tables.reviews.iter_mut().filter(|r| ids.contains(&r.id)) {
            review.is_moderated = true;
            review.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn set_verified_purchase(
        &self,
        id: Uuid,
        is_verified_purchase: bool,
    ) -> DatabaseResult<Option<Review>> {
        let mut tables = self.tables.lock().await;
        let Some(review) = tables.reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        review.is_verified_purchase = is_verified_purchase;
        review.updated_at = Utc::now();
        Ok(Some(review.clone()))
    }
}
