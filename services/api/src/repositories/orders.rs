//! PostgreSQL order repository and checkout transaction

use async_trait::async_trait;
use common::error::DatabaseResult;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::cart::{LINE_SELECT, line_from_row};
use super::{CheckoutTx, OrderStore, PgStore};
use crate::models::{
    CartLine, NewOrder, NewOrderItem, NewOrderStatus, Order, OrderChanges, OrderItem,
    OrderStatus, OrderStatusChanges, PageRequest,
};

/// Final status that does not count as a completed purchase
pub const CANCELLED_STATUS: &str = "cancelled";

const STATUS_COLUMNS: &str = "id, name, description, is_final, created_at";

const ORDER_COLUMNS: &str =
    "id, user_id, status_id, total, shipping_address, notes, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, product_sku, price, quantity, created_at";

#[async_trait]
impl OrderStore for PgStore {
    async fn list_statuses(&self) -> DatabaseResult<Vec<OrderStatus>> {
        let statuses = sqlx::query_as::<_, OrderStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM order_statuses ORDER BY created_at, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(statuses)
    }

    async fn get_status(&self, id: Uuid) -> DatabaseResult<Option<OrderStatus>> {
        let status = sqlx::query_as::<_, OrderStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM order_statuses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn default_status(&self) -> DatabaseResult<Option<OrderStatus>> {
        let status = sqlx::query_as::<_, OrderStatus>(&format!(
            r#"
            SELECT {STATUS_COLUMNS} FROM order_statuses
            WHERE NOT is_final
            ORDER BY created_at, name
            LIMIT 1
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn create_status(&self, new_status: &NewOrderStatus) -> DatabaseResult<OrderStatus> {
        let status = sqlx::query_as::<_, OrderStatus>(&format!(
            r#"
            INSERT INTO order_statuses (name, description, is_final)
            VALUES ($1, $2, $3)
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(&new_status.name)
        .bind(&new_status.description)
        .bind(new_status.is_final)
        .fetch_one(&self.pool)
        .await?;
        Ok(status)
    }

    async fn update_status(
        &self,
        id: Uuid,
        changes: &OrderStatusChanges,
    ) -> DatabaseResult<Option<OrderStatus>> {
        let status = sqlx::query_as::<_, OrderStatus>(&format!(
            r#"
            UPDATE order_statuses
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_final = COALESCE($4, is_final)
            WHERE id = $1
            RETURNING {STATUS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.is_final)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn delete_status(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM order_statuses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> DatabaseResult<(Vec<Order>, i64)> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok((orders, count))
    }

    async fn get_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn update_order(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: &OrderChanges,
    ) -> DatabaseResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status_id = COALESCE($3, status_id),
                shipping_address = COALESCE($4, shipping_address),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(changes.status)
        .bind(&changes.shipping_address)
        .bind(&changes.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn delete_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn order_items(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_order_items(&self, user_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.product_name, oi.product_sku,
                   oi.price, oi.quantity, oi.created_at
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.user_id = $1
            ORDER BY oi.created_at DESC, oi.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn get_order_item(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.product_name, oi.product_sku,
                   oi.price, oi.quantity, oi.created_at
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.id = $1 AND o.user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> DatabaseResult<bool> {
        let purchased: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                JOIN order_statuses s ON s.id = o.status_id
                WHERE o.user_id = $1
                  AND oi.product_id = $2
                  AND s.is_final
                  AND s.name <> $3
            )
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(CANCELLED_STATUS)
        .fetch_one(&self.pool)
        .await?;
        Ok(purchased)
    }

    async fn begin_checkout(&self) -> DatabaseResult<Box<dyn CheckoutTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckout { tx }))
    }
}

/// Checkout running inside one PostgreSQL transaction
///
/// Dropping it without committing rolls the transaction back.
pub struct PgCheckout {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckout {
    async fn lock_cart_lines(&mut self, user_id: Uuid) -> DatabaseResult<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            r#"
            {LINE_SELECT}
            JOIN carts c ON c.id = ci.cart_id
            WHERE c.user_id = $1
            ORDER BY ci.created_at, ci.id
            FOR UPDATE OF ci
            "#
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!(user_id = %user_id, lines = rows.len(), "locked cart lines");
        let lines = rows
            .iter()
            .map(line_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    async fn insert_order(&mut self, new_order: &NewOrder) -> DatabaseResult<Order> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (user_id, status_id, total, shipping_address, notes)
            VALUES ($1, $2, 0, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(new_order.user_id)
        .bind(new_order.status_id)
        .bind(&new_order.shipping_address)
        .bind(&new_order.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn insert_order_item(&mut self, new_item: &NewOrderItem) -> DatabaseResult<OrderItem> {
        let item = sqlx::query_as::<_, OrderItem>(&format!(
            r#"
            INSERT INTO order_items
                (order_id, product_id, product_name, product_sku, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(new_item.order_id)
        .bind(new_item.product_id)
        .bind(&new_item.product_name)
        .bind(&new_item.product_sku)
        .bind(new_item.price)
        .bind(new_item.quantity)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn set_order_total(&mut self, order_id: Uuid, total: Decimal) -> DatabaseResult<Order> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders SET total = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(total)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn clear_cart(&mut self, cart_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
