//! Shopping cart

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::money;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Cart {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    #[serde(rename = "cart")]
    pub cart_id: Uuid,
    #[serde(rename = "product")]
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product fields a cart line needs, read at view time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub is_active: bool,
}

/// A cart item joined with its product
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub item: CartItem,
    pub product: ProductSummary,
}

impl CartLine {
    pub fn total_price(&self) -> Decimal {
        money(self.product.price * Decimal::from(self.item.quantity))
    }
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddCartItem {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartItem {
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: Uuid,
    pub product: ProductSummary,
    pub quantity: i32,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CartLine> for CartItemView {
    fn from(line: CartLine) -> Self {
        let total_price = line.total_price();
        Self {
            id: line.item.id,
            product: line.product,
            quantity: line.item.quantity,
            total_price,
            created_at: line.item.created_at,
            updated_at: line.item.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub user: Uuid,
    pub items: Vec<CartItemView>,
    /// Number of distinct lines, not units
    pub total_items: usize,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    pub fn new(cart: Cart, lines: Vec<CartLine>) -> Self {
        let total_price = money(lines.iter().map(CartLine::total_price).sum());
        let items: Vec<CartItemView> = lines.into_iter().map(CartItemView::from).collect();
        Self {
            id: cart.id,
            user: cart.user_id,
            total_items: items.len(),
            items,
            total_price,
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        }
    }
}
