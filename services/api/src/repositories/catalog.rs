//! PostgreSQL catalog repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogStore, PgStore};
use crate::models::{
    Category, CategoryChanges, ImageChanges, NewCategory, NewImage, NewProduct, PageRequest,
    Product, ProductChanges, ProductFilter, ProductImage,
};

const CATEGORY_COLUMNS: &str =
    "id, name, description, parent_id, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str =
    "p.id, p.name, p.description, p.price, p.sku, p.is_active, p.created_at, p.updated_at";

const IMAGE_COLUMNS: &str = "id, product_id, image, is_main, alt_text, created_at";

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE TRUE");
    if let Some(min_price) = filter.min_price {
        builder.push(" AND p.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND p.price <= ").push_bind(max_price);
    }
    if let Some(is_active) = filter.is_active {
        builder.push(" AND p.is_active = ").push_bind(is_active);
    }
    if let Some(category) = filter.category {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM product_categories pc \
                 WHERE pc.product_id = p.id AND pc.category_id = ",
            )
            .push_bind(category)
            .push(")");
    }
    if let Some(term) = filter.search_term() {
        let pattern = format!("%{}%", term);
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

async fn replace_product_categories(
    conn: &mut PgConnection,
    product_id: Uuid,
    category_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    if !category_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO product_categories (product_id, category_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT (product_id, category_id) DO NOTHING
            "#,
        )
        .bind(product_id)
        .bind(category_ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn demote_main_images(
    conn: &mut PgConnection,
    product_id: Uuid,
    keep: Option<Uuid>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE product_images
        SET is_main = FALSE
        WHERE product_id = $1 AND is_main AND ($2::uuid IS NULL OR id <> $2)
        "#,
    )
    .bind(product_id)
    .bind(keep)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self) -> DatabaseResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> DatabaseResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, new_category: &NewCategory) -> DatabaseResult<Category> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (name, description, parent_id, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(&new_category.name)
        .bind(&new_category.description)
        .bind(new_category.parent)
        .bind(new_category.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
    ) -> DatabaseResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                parent_id = CASE WHEN $4 THEN $5 ELSE parent_id END,
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.parent.is_some())
        .bind(changes.parent.flatten())
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> DatabaseResult<(Vec<Product>, i64)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_product_filters(&mut count_query, filter);
        let count: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut list_query =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p"));
        push_product_filters(&mut list_query, filter);
        list_query
            .push(" ORDER BY ")
            .push(filter.ordering().sql())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        debug!(sql = list_query.sql(), "listing products");
        let products = list_query
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;
        Ok((products, count))
    }

    async fn get_product(&self, id: Uuid) -> DatabaseResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn create_product(&self, new_product: &NewProduct) -> DatabaseResult<Product> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products AS p (name, description, price, sku, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING p.id, p.name, p.description, p.price, p.sku, p.is_active,
                      p.created_at, p.updated_at
            "#,
        )
        .bind(&new_product.name)
        .bind(&new_product.description)
        .bind(new_product.price)
        .bind(&new_product.sku)
        .bind(new_product.is_active)
        .fetch_one(&mut *tx)
        .await?;

        replace_product_categories(&mut tx, product.id, &new_product.category_ids).await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: &ProductChanges,
    ) -> DatabaseResult<Option<Product>> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products AS p
            SET name = COALESCE($2, p.name),
                description = COALESCE($3, p.description),
                price = COALESCE($4, p.price),
                sku = COALESCE($5, p.sku),
                is_active = COALESCE($6, p.is_active),
                updated_at = NOW()
            WHERE p.id = $1
            RETURNING p.id, p.name, p.description, p.price, p.sku, p.is_active,
                      p.created_at, p.updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(&changes.sku)
        .bind(changes.is_active)
        .fetch_optional(&mut *tx)
        .await?;

        if let (Some(product), Some(category_ids)) = (&product, &changes.category_ids) {
            replace_product_categories(&mut tx, product.id, category_ids).await?;
        }

        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn product_categories(&self, product_id: Uuid) -> DatabaseResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.description, c.parent_id, c.is_active,
                   c.created_at, c.updated_at
            FROM categories c
            JOIN product_categories pc ON pc.category_id = c.id
            WHERE pc.product_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn list_images(&self, product_id: Option<Uuid>) -> DatabaseResult<Vec<ProductImage>> {
        let images = sqlx::query_as::<_, ProductImage>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS} FROM product_images
            WHERE $1::uuid IS NULL OR product_id = $1
            ORDER BY is_main DESC, created_at ASC
            "#
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn get_image(&self, id: Uuid) -> DatabaseResult<Option<ProductImage>> {
        let image = sqlx::query_as::<_, ProductImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(image)
    }

    async fn create_image(&self, new_image: &NewImage) -> DatabaseResult<ProductImage> {
        let mut tx = self.pool.begin().await?;

        if new_image.is_main {
            demote_main_images(&mut tx, new_image.product, None).await?;
        }

        let image = sqlx::query_as::<_, ProductImage>(&format!(
            r#"
            INSERT INTO product_images (product_id, image, is_main, alt_text)
            VALUES ($1, $2, $3, $4)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(new_image.product)
        .bind(&new_image.image)
        .bind(new_image.is_main)
        .bind(&new_image.alt_text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }

    async fn update_image(
        &self,
        id: Uuid,
        changes: &ImageChanges,
    ) -> DatabaseResult<Option<ProductImage>> {
        let mut tx = self.pool.begin().await?;

        let product_id: Option<Uuid> =
            sqlx::query_scalar("SELECT product_id FROM product_images WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(product_id) = product_id else {
            return Ok(None);
        };

        if changes.is_main == Some(true) {
            demote_main_images(&mut tx, product_id, Some(id)).await?;
        }

        let image = sqlx::query_as::<_, ProductImage>(&format!(
            r#"
            UPDATE product_images
            SET image = COALESCE($2, image),
                is_main = COALESCE($3, is_main),
                alt_text = COALESCE($4, alt_text)
            WHERE id = $1
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.image)
        .bind(changes.is_main)
        .bind(&changes.alt_text)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }

    async fn delete_image(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM product_images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        common::database::health_check(&self.pool)
            .await
            .unwrap_or(false)
    }
}
