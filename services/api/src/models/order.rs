//! Orders, order lines and order statuses

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{CartLine, money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderStatus {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Informational only; transitions are not restricted
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderStatus {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderStatusChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_final: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "status")]
    pub status_id: Uuid,
    pub total: Decimal,
    pub shipping_address: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order row as inserted at checkout, before items exist
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub status_id: Uuid,
    pub shipping_address: String,
    pub notes: String,
}

/// Checkout payload; everything is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceOrder {
    pub status: Option<Uuid>,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderChanges {
    pub status: Option<Uuid>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Order line with the product snapshot taken at checkout
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    #[serde(rename = "order")]
    pub order_id: Uuid,
    /// `None` once the product has been deleted
    #[serde(rename = "product")]
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub price: Decimal,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn total_price(&self) -> Decimal {
        money(self.price * Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl NewOrderItem {
    pub fn from_line(order_id: Uuid, line: &CartLine) -> Self {
        Self {
            order_id,
            product_id: line.product.id,
            product_name: line.product.name.clone(),
            product_sku: line.product.sku.clone(),
            price: line.product.price,
            quantity: line.item.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItem,
    pub total_price: Decimal,
}

impl From<OrderItem> for OrderItemView {
    fn from(item: OrderItem) -> Self {
        let total_price = item.total_price();
        Self { item, total_price }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status_info: OrderStatus,
    pub total_display: String,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn new(order: Order, status: OrderStatus, items: Vec<OrderItem>) -> Self {
        Self {
            total_display: money(order.total).to_string(),
            order,
            status_info: status,
            items: items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}
