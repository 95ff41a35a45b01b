//! PostgreSQL cart repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use super::{CartStore, PgStore};
use crate::models::{Cart, CartItem, CartLine, ProductSummary};

const CART_COLUMNS: &str = "id, user_id, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, created_at, updated_at";

/// Cart items joined with their product, shared with checkout
pub(super) const LINE_SELECT: &str = r#"
    SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.created_at, ci.updated_at,
           p.name AS product_name, p.sku AS product_sku, p.price AS product_price,
           p.is_active AS product_is_active
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
"#;

pub(super) fn line_from_row(row: &PgRow) -> Result<CartLine, sqlx::Error> {
    let item = CartItem {
        id: row.try_get("id")?,
        cart_id: row.try_get("cart_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    };
    let product = ProductSummary {
        id: item.product_id,
        name: row.try_get("product_name")?,
        sku: row.try_get("product_sku")?,
        price: row.try_get("product_price")?,
        is_active: row.try_get("product_is_active")?,
    };
    Ok(CartLine { item, product })
}

#[async_trait]
impl CartStore for PgStore {
    async fn get_or_create_cart(&self, user_id: Uuid) -> DatabaseResult<Cart> {
        let cart = sqlx::query_as::<_, Cart>(&format!(
            r#"
            INSERT INTO carts (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn find_cart(&self, user_id: Uuid) -> DatabaseResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn add_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> DatabaseResult<CartItem> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, CartItem>(&format!(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = cart_items.quantity + EXCLUDED.quantity,
                updated_at = NOW()
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn get_item(&self, cart_id: Uuid, item_id: Uuid) -> DatabaseResult<Option<CartLine>> {
        let row = sqlx::query(&format!("{LINE_SELECT} WHERE ci.cart_id = $1 AND ci.id = $2"))
            .bind(cart_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(line_from_row).transpose()?)
    }

    async fn set_item_quantity(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> DatabaseResult<Option<CartItem>> {
        let item = sqlx::query_as::<_, CartItem>(&format!(
            r#"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE cart_id = $1 AND id = $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn remove_item(&self, cart_id: Uuid, item_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2")
            .bind(cart_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn cart_lines(&self, cart_id: Uuid) -> DatabaseResult<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            "{LINE_SELECT} WHERE ci.cart_id = $1 ORDER BY ci.created_at, ci.id"
        ))
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;
        let lines = rows
            .iter()
            .map(line_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }
}
