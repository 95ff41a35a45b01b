//! Catalog: categories, products and product images

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::double_option;

fn default_true() -> bool {
    true
}

/// Category node; `parent_id` forms a forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "parent")]
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial category update; `"parent": null` detaches the category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryFilter {
    pub is_active: Option<bool>,
    pub parent: Option<Uuid>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub parent_name: Option<String>,
    /// Names from the root down, joined with " > "
    pub full_path: String,
    pub subcategories_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategories: Option<Vec<Category>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub sku: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub sku: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// Partial product update; `category_ids` replaces every category link
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub is_active: Option<bool>,
    pub category_ids: Option<Vec<Uuid>>,
}

/// Product list ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductOrdering {
    Price,
    PriceDesc,
    CreatedAt,
    #[default]
    CreatedAtDesc,
    Name,
    NameDesc,
}

impl ProductOrdering {
    /// Unknown values fall back to newest first
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("price") => ProductOrdering::Price,
            Some("-price") => ProductOrdering::PriceDesc,
            Some("created_at") => ProductOrdering::CreatedAt,
            Some("name") => ProductOrdering::Name,
            Some("-name") => ProductOrdering::NameDesc,
            _ => ProductOrdering::CreatedAtDesc,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            ProductOrdering::Price => "p.price ASC, p.created_at DESC",
            ProductOrdering::PriceDesc => "p.price DESC, p.created_at DESC",
            ProductOrdering::CreatedAt => "p.created_at ASC",
            ProductOrdering::CreatedAtDesc => "p.created_at DESC",
            ProductOrdering::Name => "p.name ASC",
            ProductOrdering::NameDesc => "p.name DESC",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ProductFilter {
    pub fn ordering(&self) -> ProductOrdering {
        ProductOrdering::parse(self.ordering.as_deref())
    }

    /// Search term, trimmed, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub categories: Vec<Category>,
    pub images: Vec<ProductImage>,
    pub main_image_url: Option<String>,
}

impl ProductView {
    /// `images` must already be ordered main image first
    pub fn new(product: Product, categories: Vec<Category>, images: Vec<ProductImage>) -> Self {
        let main_image_url = images.first().map(|image| image.image.clone());
        Self {
            product,
            categories,
            images,
            main_image_url,
        }
    }
}

/// Reference to an image binary stored elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductImage {
    pub id: Uuid,
    #[serde(rename = "product")]
    pub product_id: Uuid,
    pub image: String,
    pub is_main: bool,
    pub alt_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewImage {
    pub product: Uuid,
    pub image: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub alt_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageChanges {
    pub image: Option<String>,
    pub is_main: Option<bool>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageFilter {
    pub product: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_parses_known_fields() {
        assert_eq!(ProductOrdering::parse(Some("-price")), ProductOrdering::PriceDesc);
        assert_eq!(ProductOrdering::parse(Some("name")), ProductOrdering::Name);
        assert_eq!(ProductOrdering::parse(Some("bogus")), ProductOrdering::CreatedAtDesc);
        assert_eq!(ProductOrdering::parse(None), ProductOrdering::CreatedAtDesc);
    }

    #[test]
    fn explicit_null_parent_detaches() {
        let changes: CategoryChanges = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        assert_eq!(changes.parent, Some(None));

        let changes: CategoryChanges = serde_json::from_str(r#"{"name": "Shoes"}"#).unwrap();
        assert_eq!(changes.parent, None);
    }
}
