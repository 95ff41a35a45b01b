//! Categories, products and product images

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::require_text;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        Category, CategoryChanges, CategoryFilter, CategoryView, ImageChanges, ImageFilter,
        NewCategory, NewImage, NewProduct, Page, PageRequest, Product, ProductChanges,
        ProductFilter, ProductImage, ProductView, max_money, money,
    },
    repositories::CatalogStore,
};

const PATH_SEPARATOR: &str = " > ";

/// Walk `parent_id` links from `start` up to the root, `start` included
///
/// Stops early on a repeated id so a corrupt tree cannot loop forever.
fn ancestors(by_id: &HashMap<Uuid, &Category>, start: Uuid) -> Vec<Uuid> {
    let mut chain = Vec::new();
    let mut current = Some(start);
    while let Some(id) = current {
        if chain.contains(&id) {
            break;
        }
        chain.push(id);
        current = by_id.get(&id).and_then(|c| c.parent_id);
    }
    chain
}

fn category_view(all: &[Category], category: Category, with_children: bool) -> CategoryView {
    let by_id: HashMap<Uuid, &Category> = all.iter().map(|c| (c.id, c)).collect();

    let mut names: Vec<String> = ancestors(&by_id, category.id)
        .iter()
        .skip(1)
        .filter_map(|id| by_id.get(id).map(|c| c.name.clone()))
        .collect();
    names.reverse();
    names.push(category.name.clone());

    let children: Vec<Category> = all
        .iter()
        .filter(|c| c.parent_id == Some(category.id))
        .cloned()
        .collect();

    CategoryView {
        parent_name: category
            .parent_id
            .and_then(|id| by_id.get(&id))
            .map(|p| p.name.clone()),
        full_path: names.join(PATH_SEPARATOR),
        subcategories_count: children.len(),
        subcategories: with_children.then_some(children),
        category,
    }
}

fn check_price(price: Decimal) -> ApiResult<Decimal> {
    if price < Decimal::ZERO {
        return Err(ApiError::Validation("price must not be negative".to_string()));
    }
    let price = money(price);
    if price > max_money() {
        return Err(ApiError::Validation("price is too large".to_string()));
    }
    Ok(price)
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    pub async fn list_categories(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> ApiResult<Page<CategoryView>> {
        let all = self.store.list_categories().await?;
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut matching: Vec<Category> = all
            .iter()
            .filter(|c| filter.is_active.is_none_or(|active| c.is_active == active))
            .filter(|c| filter.parent.is_none_or(|parent| c.parent_id == Some(parent)))
            .filter(|c| {
                search.as_ref().is_none_or(|term| {
                    c.name.to_lowercase().contains(term)
                        || c.description.to_lowercase().contains(term)
                })
            })
            .cloned()
            .collect();

        match filter.ordering.as_deref().map(str::trim) {
            Some("created_at") => matching.sort_by_key(|c| c.created_at),
            Some("-created_at") => matching.sort_by_key(|c| std::cmp::Reverse(c.created_at)),
            Some("-name") => matching.sort_by(|a, b| b.name.cmp(&a.name)),
            _ => {}
        }

        Ok(Page::from_vec(matching, page).map(|c| category_view(&all, c, false)))
    }

    pub async fn get_category(&self, id: Uuid) -> ApiResult<CategoryView> {
        let all = self.store.list_categories().await?;
        let category = all
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Category"))?;
        Ok(category_view(&all, category, true))
    }

    pub async fn create_category(
        &self,
        caller: &AuthUser,
        new_category: NewCategory,
    ) -> ApiResult<CategoryView> {
        caller.require_staff()?;
        require_text("name", &new_category.name)?;
        if let Some(parent) = new_category.parent {
            if self.store.get_category(parent).await?.is_none() {
                return Err(ApiError::Validation(
                    "parent category does not exist".to_string(),
                ));
            }
        }

        let category = self.store.create_category(&new_category).await?;
        info!(category_id = %category.id, "category created");
        self.get_category(category.id).await
    }

    pub async fn update_category(
        &self,
        caller: &AuthUser,
        id: Uuid,
        changes: CategoryChanges,
    ) -> ApiResult<CategoryView> {
        caller.require_staff()?;
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }

        let all = self.store.list_categories().await?;
        if !all.iter().any(|c| c.id == id) {
            return Err(ApiError::not_found("Category"));
        }
        if let Some(Some(parent)) = changes.parent {
            let by_id: HashMap<Uuid, &Category> = all.iter().map(|c| (c.id, c)).collect();
            if !by_id.contains_key(&parent) {
                return Err(ApiError::Validation(
                    "parent category does not exist".to_string(),
                ));
            }
            if ancestors(&by_id, parent).contains(&id) {
                return Err(ApiError::Validation(
                    "a category cannot be moved under itself or one of its descendants"
                        .to_string(),
                ));
            }
        }

        self.store
            .update_category(id, &changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Category"))?;
        self.get_category(id).await
    }

    pub async fn delete_category(&self, caller: &AuthUser, id: Uuid) -> ApiResult<()> {
        caller.require_staff()?;
        if !self.store.delete_category(id).await? {
            return Err(ApiError::not_found("Category"));
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn product_view(&self, product: Product) -> ApiResult<ProductView> {
        let categories = self.store.product_categories(product.id).await?;
        let images = self.store.list_images(Some(product.id)).await?;
        Ok(ProductView::new(product, categories, images))
    }

    async fn check_categories(&self, category_ids: &[Uuid]) -> ApiResult<()> {
        for id in category_ids {
            if self.store.get_category(*id).await?.is_none() {
                return Err(ApiError::Validation(format!("category {} does not exist", id)));
            }
        }
        Ok(())
    }

    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> ApiResult<Page<ProductView>> {
        let (products, count) = self.store.list_products(filter, page).await?;
        let mut views = Vec::with_capacity(products.len());
        for product in products {
            views.push(self.product_view(product).await?);
        }
        Ok(Page::new(views, count, page))
    }

    pub async fn get_product(&self, id: Uuid) -> ApiResult<ProductView> {
        let product = self
            .store
            .get_product(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product"))?;
        self.product_view(product).await
    }

    pub async fn create_product(
        &self,
        caller: &AuthUser,
        mut new_product: NewProduct,
    ) -> ApiResult<ProductView> {
        caller.require_staff()?;
        require_text("name", &new_product.name)?;
        require_text("sku", &new_product.sku)?;
        new_product.sku = new_product.sku.trim().to_string();
        new_product.price = check_price(new_product.price)?;
        self.check_categories(&new_product.category_ids).await?;

        let product = self
            .store
            .create_product(&new_product)
            .await
            .map_err(ApiError::conflict_or("A product with this SKU already exists"))?;

        info!(product_id = %product.id, sku = %product.sku, "product created");
        self.product_view(product).await
    }

    pub async fn update_product(
        &self,
        caller: &AuthUser,
        id: Uuid,
        mut changes: ProductChanges,
    ) -> ApiResult<ProductView> {
        caller.require_staff()?;
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }
        if let Some(sku) = changes.sku.take() {
            require_text("sku", &sku)?;
            changes.sku = Some(sku.trim().to_string());
        }
        if let Some(price) = changes.price {
            changes.price = Some(check_price(price)?);
        }
        if let Some(category_ids) = &changes.category_ids {
            self.check_categories(category_ids).await?;
        }

        let product = self
            .store
            .update_product(id, &changes)
            .await
            .map_err(ApiError::conflict_or("A product with this SKU already exists"))?
            .ok_or_else(|| ApiError::not_found("Product"))?;
        self.product_view(product).await
    }

    pub async fn delete_product(&self, caller: &AuthUser, id: Uuid) -> ApiResult<()> {
        caller.require_staff()?;
        if !self.store.delete_product(id).await? {
            return Err(ApiError::not_found("Product"));
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn list_images(
        &self,
        filter: &ImageFilter,
        page: PageRequest,
    ) -> ApiResult<Page<ProductImage>> {
        let images = self.store.list_images(filter.product).await?;
        Ok(Page::from_vec(images, page))
    }

    pub async fn get_image(&self, id: Uuid) -> ApiResult<ProductImage> {
        self.store
            .get_image(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product image"))
    }

    pub async fn create_image(
        &self,
        caller: &AuthUser,
        new_image: NewImage,
    ) -> ApiResult<ProductImage> {
        caller.require_staff()?;
        require_text("image", &new_image.image)?;
        if self.store.get_product(new_image.product).await?.is_none() {
            return Err(ApiError::Validation("product does not exist".to_string()));
        }
        Ok(self.store.create_image(&new_image).await?)
    }

    pub async fn update_image(
        &self,
        caller: &AuthUser,
        id: Uuid,
        changes: ImageChanges,
    ) -> ApiResult<ProductImage> {
        caller.require_staff()?;
        if let Some(image) = &changes.image {
            require_text("image", image)?;
        }
        self.store
            .update_image(id, &changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Product image"))
    }

    pub async fn delete_image(&self, caller: &AuthUser, id: Uuid) -> ApiResult<()> {
        caller.require_staff()?;
        if !self.store.delete_image(id).await? {
            return Err(ApiError::not_found("Product image"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use crate::services::fixtures::{product, shopper, staff};
    use std::str::FromStr;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    fn category(name: &str, parent: Option<Uuid>) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            description: String::new(),
            parent,
            is_active: true,
        }
    }

    fn first_page() -> PageRequest {
        PageRequest { page: 1, page_size: 20 }
    }

    #[tokio::test]
    async fn full_path_follows_the_parents() {
        let catalog = service();
        let admin = staff();
        let clothing = catalog
            .create_category(&admin, category("Clothing", None))
            .await
            .unwrap();
        let shoes = catalog
            .create_category(&admin, category("Shoes", Some(clothing.category.id)))
            .await
            .unwrap();
        assert_eq!(shoes.full_path, "Clothing > Shoes");
        assert_eq!(shoes.parent_name.as_deref(), Some("Clothing"));

        let clothing = catalog.get_category(clothing.category.id).await.unwrap();
        assert_eq!(clothing.subcategories_count, 1);
        assert_eq!(clothing.subcategories.unwrap()[0].name, "Shoes");
    }

    #[tokio::test]
    async fn category_cycles_are_rejected() {
        let catalog = service();
        let admin = staff();
        let root = catalog
            .create_category(&admin, category("Root", None))
            .await
            .unwrap();
        let child = catalog
            .create_category(&admin, category("Child", Some(root.category.id)))
            .await
            .unwrap();
        let grandchild = catalog
            .create_category(&admin, category("Grandchild", Some(child.category.id)))
            .await
            .unwrap();

        for parent in [root.category.id, grandchild.category.id] {
            let changes = CategoryChanges {
                parent: Some(Some(parent)),
                ..CategoryChanges::default()
            };
            let err = catalog
                .update_category(&admin, root.category.id, changes)
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }

        let detach = CategoryChanges {
            parent: Some(None),
            ..CategoryChanges::default()
        };
        let child = catalog
            .update_category(&admin, child.category.id, detach)
            .await
            .unwrap();
        assert_eq!(child.category.parent_id, None);
    }

    #[tokio::test]
    async fn unknown_parent_is_a_validation_error() {
        let err = service()
            .create_category(&staff(), category("Orphan", Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn catalog_writes_are_staff_only() {
        let err = service()
            .create_product(&shopper(), product("SKU-1", "1.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn product_rules() {
        let catalog = service();
        let admin = staff();

        let err = catalog
            .create_product(&admin, product("NEG", "-1.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = catalog
            .create_product(&admin, product("HUGE", "100000000.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "price is too large"));
        catalog
            .create_product(&admin, product("TOP", "99999999.99"))
            .await
            .unwrap();

        catalog
            .create_product(&admin, product("SKU-1", "10"))
            .await
            .unwrap();
        let err = catalog
            .create_product(&admin, product("SKU-1", "12.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let mut linked = product("SKU-2", "5.00");
        linked.category_ids = vec![Uuid::new_v4()];
        let err = catalog.create_product(&admin, linked).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn category_links_are_replaced_on_update() {
        let catalog = service();
        let admin = staff();
        let mugs = catalog
            .create_category(&admin, category("Mugs", None))
            .await
            .unwrap();
        let gifts = catalog
            .create_category(&admin, category("Gifts", None))
            .await
            .unwrap();

        let mut new_product = product("MUG-1", "8.50");
        new_product.category_ids = vec![mugs.category.id];
        let created = catalog.create_product(&admin, new_product).await.unwrap();
        assert_eq!(created.product.price.to_string(), "8.50");
        assert_eq!(created.categories.len(), 1);

        let changes = ProductChanges {
            category_ids: Some(vec![gifts.category.id]),
            ..ProductChanges::default()
        };
        let updated = catalog
            .update_product(&admin, created.product.id, changes)
            .await
            .unwrap();
        assert_eq!(updated.categories.len(), 1);
        assert_eq!(updated.categories[0].name, "Gifts");

        let filter = ProductFilter {
            category: Some(mugs.category.id),
            ..ProductFilter::default()
        };
        let page = catalog.list_products(&filter, first_page()).await.unwrap();
        assert_eq!(page.count, 0);
    }

    #[tokio::test]
    async fn only_one_main_image_per_product() {
        let catalog = service();
        let admin = staff();
        let mug = catalog
            .create_product(&admin, product("MUG-1", "8.00"))
            .await
            .unwrap();

        let image = |path: &str| NewImage {
            product: mug.product.id,
            image: path.to_string(),
            is_main: true,
            alt_text: String::new(),
        };
        let first = catalog.create_image(&admin, image("a.jpg")).await.unwrap();
        let second = catalog.create_image(&admin, image("b.jpg")).await.unwrap();

        let view = catalog.get_product(mug.product.id).await.unwrap();
        let mains: Vec<&ProductImage> = view.images.iter().filter(|i| i.is_main).collect();
        assert_eq!(mains.len(), 1);
        assert_eq!(mains[0].id, second.id);
        assert_eq!(view.main_image_url.as_deref(), Some("b.jpg"));

        let changes = ImageChanges {
            is_main: Some(true),
            ..ImageChanges::default()
        };
        catalog.update_image(&admin, first.id, changes).await.unwrap();
        let view = catalog.get_product(mug.product.id).await.unwrap();
        assert_eq!(view.main_image_url.as_deref(), Some("a.jpg"));
        assert_eq!(view.images.iter().filter(|i| i.is_main).count(), 1);
    }

    #[tokio::test]
    async fn products_are_listed_by_price() {
        let catalog = service();
        let admin = staff();
        for (sku, price) in [("A", "3.00"), ("B", "1.00"), ("C", "2.00")] {
            catalog.create_product(&admin, product(sku, price)).await.unwrap();
        }
        let filter = ProductFilter {
            ordering: Some("price".to_string()),
            min_price: Some(Decimal::from_str("1.50").unwrap()),
            ..ProductFilter::default()
        };
        let page = catalog.list_products(&filter, first_page()).await.unwrap();
        let skus: Vec<&str> = page.results.iter().map(|p| p.product.sku.as_str()).collect();
        assert_eq!(skus, vec!["C", "A"]);
        assert_eq!(page.count, 2);
    }
}
