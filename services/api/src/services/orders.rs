//! Order placement, order history and order statuses

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::require_text;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        NewOrder, NewOrderItem, NewOrderStatus, Order, OrderChanges, OrderItem, OrderItemView,
        OrderStatus, OrderStatusChanges, OrderView, Page, PageRequest, PlaceOrder, money,
    },
    repositories::OrderStore,
};
use common::error::DatabaseError;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// The requested status, or the earliest non-final one
    async fn resolve_status(&self, requested: Option<Uuid>) -> ApiResult<OrderStatus> {
        match requested {
            Some(id) => self
                .store
                .get_status(id)
                .await?
                .ok_or_else(|| ApiError::Validation("order status does not exist".to_string())),
            None => self
                .store
                .default_status()
                .await?
                .ok_or_else(|| ApiError::Validation("no order status configured".to_string())),
        }
    }

    /// Turn the caller's cart into an order
    ///
    /// Runs in one transaction: the order, its items, the total and the
    /// emptied cart become visible together or not at all.
    pub async fn place_order(&self, user_id: Uuid, request: PlaceOrder) -> ApiResult<OrderView> {
        let status = self.resolve_status(request.status).await?;

        let mut checkout = self.store.begin_checkout().await?;
        let lines = checkout.lock_cart_lines(user_id).await?;
        let Some(cart_id) = lines.first().map(|line| line.item.cart_id) else {
            return Err(ApiError::NotFound("cart is empty".to_string()));
        };

        let order = checkout
            .insert_order(&NewOrder {
                user_id,
                status_id: status.id,
                shipping_address: request.shipping_address,
                notes: request.notes,
            })
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = checkout
                .insert_order_item(&NewOrderItem::from_line(order.id, line))
                .await?;
            items.push(item);
        }

        let total = money(items.iter().map(OrderItem::total_price).sum());
        let order = checkout
            .set_order_total(order.id, total)
            .await
            .map_err(ApiError::out_of_range_or("order total is too large"))?;
        checkout.clear_cart(cart_id).await?;
        checkout.commit().await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "order commit failed");
            ApiError::Database(e)
        })?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            items = items.len(),
            total = %order.total,
            "order placed"
        );
        Ok(OrderView::new(order, status, items))
    }

    async fn order_view(&self, order: Order) -> ApiResult<OrderView> {
        let status = self
            .store
            .get_status(order.status_id)
            .await?
            .ok_or_else(|| ApiError::Internal(format!("order {} has no status", order.id)))?;
        let items = self.store.order_items(order.id).await?;
        Ok(OrderView::new(order, status, items))
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> ApiResult<Page<OrderView>> {
        let statuses: HashMap<Uuid, OrderStatus> = self
            .store
            .list_statuses()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let (orders, count) = self.store.list_orders(user_id, page).await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let status = statuses.get(&order.status_id).cloned().ok_or_else(|| {
                ApiError::Internal(format!("order {} has no status", order.id))
            })?;
            let items = self.store.order_items(order.id).await?;
            views.push(OrderView::new(order, status, items));
        }
        Ok(Page::new(views, count, page))
    }

    pub async fn get_order(&self, user_id: Uuid, id: Uuid) -> ApiResult<OrderView> {
        let order = self
            .store
            .get_order(user_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Order"))?;
        self.order_view(order).await
    }

    /// Any status may follow any other
    pub async fn update_order(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: OrderChanges,
    ) -> ApiResult<OrderView> {
        if let Some(status) = changes.status {
            if self.store.get_status(status).await?.is_none() {
                return Err(ApiError::Validation(
                    "order status does not exist".to_string(),
                ));
            }
        }
        let order = self
            .store
            .update_order(user_id, id, &changes)
            .await?
            .ok_or_else(|| ApiError::not_found("Order"))?;
        self.order_view(order).await
    }

    pub async fn delete_order(&self, user_id: Uuid, id: Uuid) -> ApiResult<()> {
        if !self.store.delete_order(user_id, id).await? {
            return Err(ApiError::not_found("Order"));
        }
        info!(order_id = %id, "order deleted");
        Ok(())
    }

    pub async fn list_order_items(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> ApiResult<Page<OrderItemView>> {
        let items = self.store.list_order_items(user_id).await?;
        Ok(Page::from_vec(items, page).map(OrderItemView::from))
    }

    pub async fn get_order_item(&self, user_id: Uuid, id: Uuid) -> ApiResult<OrderItemView> {
        self.store
            .get_order_item(user_id, id)
            .await?
            .map(OrderItemView::from)
            .ok_or_else(|| ApiError::not_found("Order item"))
    }

    pub async fn list_statuses(&self, page: PageRequest) -> ApiResult<Page<OrderStatus>> {
        Ok(Page::from_vec(self.store.list_statuses().await?, page))
    }

    pub async fn get_status(&self, id: Uuid) -> ApiResult<OrderStatus> {
        self.store
            .get_status(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Order status"))
    }

    pub async fn create_status(
        &self,
        caller: &AuthUser,
        new_status: NewOrderStatus,
    ) -> ApiResult<OrderStatus> {
        caller.require_staff()?;
        require_text("name", &new_status.name)?;
        let status = self
            .store
            .create_status(&new_status)
            .await
            .map_err(ApiError::conflict_or("An order status with this name already exists"))?;
        info!(status_id = %status.id, name = %status.name, "order status created");
        Ok(status)
    }

    pub async fn update_status(
        &self,
        caller: &AuthUser,
        id: Uuid,
        changes: OrderStatusChanges,
    ) -> ApiResult<OrderStatus> {
        caller.require_staff()?;
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }
        self.store
            .update_status(id, &changes)
            .await
            .map_err(ApiError::conflict_or("An order status with this name already exists"))?
            .ok_or_else(|| ApiError::not_found("Order status"))
    }

    pub async fn delete_status(&self, caller: &AuthUser, id: Uuid) -> ApiResult<()> {
        caller.require_staff()?;
        let deleted = self.store.delete_status(id).await.map_err(|e| match e {
            DatabaseError::Constraint(_) => {
                ApiError::Conflict("order status is still used by orders".to_string())
            }
            other => ApiError::Database(other),
        })?;
        if !deleted {
            return Err(ApiError::not_found("Order status"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddCartItem, CartLine, ProductChanges};
    use crate::repositories::{CheckoutTx, MemoryStore};
    use crate::services::fixtures::{product, shopper, staff};
    use crate::services::{CartService, CatalogService};
    use async_trait::async_trait;
    use common::error::DatabaseResult;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    struct Shop {
        store: Arc<MemoryStore>,
        catalog: CatalogService,
        carts: CartService,
        orders: OrderService,
    }

    fn shop() -> Shop {
        let store = Arc::new(MemoryStore::with_default_statuses());
        Shop {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), store.clone()),
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    fn first_page() -> PageRequest {
        PageRequest { page: 1, page_size: 20 }
    }

    /// Fill the user's cart with (P1, 100.00, 2) and (P2, 50.00, 1)
    async fn fill_cart(shop: &Shop, user_id: Uuid) -> (Uuid, Uuid) {
        let admin = staff();
        let p1 = shop
            .catalog
            .create_product(&admin, product("P1", "100.00"))
            .await
            .unwrap();
        let p2 = shop
            .catalog
            .create_product(&admin, product("P2", "50.00"))
            .await
            .unwrap();
        for (product_id, quantity) in [(p1.product.id, 2), (p2.product.id, 1)] {
            shop.carts
                .add_item(user_id, AddCartItem { product_id, quantity })
                .await
                .unwrap();
        }
        (p1.product.id, p2.product.id)
    }

    #[tokio::test]
    async fn order_total_and_snapshots() {
        let shop = shop();
        let user = Uuid::new_v4();
        let (p1, _) = fill_cart(&shop, user).await;

        let order = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap();
        assert_eq!(order.order.total, Decimal::from_str("250.00").unwrap());
        assert_eq!(order.total_display, "250.00");
        assert_eq!(order.status_info.name, "new");
        assert_eq!(order.items.len(), 2);

        let first = order
            .items
            .iter()
            .find(|i| i.item.product_id == Some(p1))
            .unwrap();
        assert_eq!(first.item.product_name, "Product P1");
        assert_eq!(first.item.product_sku, "P1");
        assert_eq!(first.item.price, Decimal::from_str("100.00").unwrap());
        assert_eq!(first.total_price.to_string(), "200.00");

        let cart = shop.carts.cart_view(user).await.unwrap();
        assert!(cart.items.is_empty());
    }

    #[tokio::test]
    async fn later_price_changes_do_not_touch_order_items() {
        let shop = shop();
        let user = Uuid::new_v4();
        let (p1, _) = fill_cart(&shop, user).await;
        let order = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap();

        let changes = ProductChanges {
            price: Some(Decimal::from_str("999.00").unwrap()),
            ..ProductChanges::default()
        };
        shop.catalog
            .update_product(&staff(), p1, changes)
            .await
            .unwrap();

        let order = shop.orders.get_order(user, order.order.id).await.unwrap();
        let item = order
            .items
            .iter()
            .find(|i| i.item.product_id == Some(p1))
            .unwrap();
        assert_eq!(item.item.price, Decimal::from_str("100.00").unwrap());
        assert_eq!(order.order.total, Decimal::from_str("250.00").unwrap());
    }

    #[tokio::test]
    async fn deleted_products_leave_order_items_behind() {
        let shop = shop();
        let user = Uuid::new_v4();
        let (p1, _) = fill_cart(&shop, user).await;
        let order = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap();

        shop.catalog.delete_product(&staff(), p1).await.unwrap();

        let order = shop.orders.get_order(user, order.order.id).await.unwrap();
        assert_eq!(order.items.len(), 2);
        let orphan = order
            .items
            .iter()
            .find(|i| i.item.product_sku == "P1")
            .unwrap();
        assert_eq!(orphan.item.product_id, None);
        assert_eq!(orphan.item.product_name, "Product P1");
        assert_eq!(orphan.item.price, Decimal::from_str("100.00").unwrap());
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let shop = shop();
        let user = Uuid::new_v4();
        let err = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(msg) if msg == "cart is empty"));

        shop.carts.get_or_create_cart(user).await.unwrap();
        let err = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn oversized_total_is_rejected_and_rolled_back() {
        let shop = shop();
        let user = Uuid::new_v4();
        let yacht = shop
            .catalog
            .create_product(&staff(), product("YACHT", "99999999.99"))
            .await
            .unwrap();
        shop.carts
            .add_item(
                user,
                AddCartItem {
                    product_id: yacht.product.id,
                    quantity: 2,
                },
            )
            .await
            .unwrap();

        let err = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "order total is too large"));

        let (orders, count) = shop.store.list_orders(user, first_page()).await.unwrap();
        assert!(orders.is_empty());
        assert_eq!(count, 0);
        let cart = shop.carts.cart_view(user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn missing_statuses_are_validation_errors() {
        let store = Arc::new(MemoryStore::new());
        let orders = OrderService::new(store);
        let err = orders
            .place_order(Uuid::new_v4(), PlaceOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "no order status configured"));

        let shop = shop();
        let request = PlaceOrder {
            status: Some(Uuid::new_v4()),
            ..PlaceOrder::default()
        };
        let err = shop
            .orders
            .place_order(Uuid::new_v4(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn orders_of_other_users_are_not_found() {
        let shop = shop();
        let owner = Uuid::new_v4();
        fill_cart(&shop, owner).await;
        let order = shop
            .orders
            .place_order(owner, PlaceOrder::default())
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        let err = shop
            .orders
            .get_order(stranger, order.order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let page = shop.orders.list_orders(stranger, first_page()).await.unwrap();
        assert_eq!(page.count, 0);
        let items = shop
            .orders
            .list_order_items(stranger, first_page())
            .await
            .unwrap();
        assert_eq!(items.count, 0);

        let items = shop.orders.list_order_items(owner, first_page()).await.unwrap();
        assert_eq!(items.count, 2);
    }

    #[tokio::test]
    async fn status_may_change_freely() {
        let shop = shop();
        let user = Uuid::new_v4();
        fill_cart(&shop, user).await;
        let order = shop
            .orders
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap();

        let statuses = shop.orders.list_statuses(first_page()).await.unwrap();
        let delivered = statuses
            .results
            .iter()
            .find(|s| s.name == "delivered")
            .unwrap();
        let changes = OrderChanges {
            status: Some(delivered.id),
            ..OrderChanges::default()
        };
        let order = shop
            .orders
            .update_order(user, order.order.id, changes)
            .await
            .unwrap();
        assert!(order.status_info.is_final);

        let err = shop
            .orders
            .delete_status(&staff(), delivered.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn status_writes_are_staff_only_and_names_unique() {
        let shop = shop();
        let new_status = |name: &str| NewOrderStatus {
            name: name.to_string(),
            description: String::new(),
            is_final: false,
        };
        let err = shop
            .orders
            .create_status(&shopper(), new_status("returned"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let err = shop
            .orders
            .create_status(&staff(), new_status("new"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    /// Order store whose checkout fails right before the cart is cleared
    struct FailingClear(Arc<MemoryStore>);

    struct FailingCheckout(Box<dyn CheckoutTx>);

    #[async_trait]
    impl CheckoutTx for FailingCheckout {
        async fn lock_cart_lines(&mut self, user_id: Uuid) -> DatabaseResult<Vec<CartLine>> {
            self.0.lock_cart_lines(user_id).await
        }

        async fn insert_order(&mut self, new_order: &NewOrder) -> DatabaseResult<Order> {
            self.0.insert_order(new_order).await
        }

        async fn insert_order_item(
            &mut self,
            new_item: &NewOrderItem,
        ) -> DatabaseResult<OrderItem> {
            self.0.insert_order_item(new_item).await
        }

        async fn set_order_total(
            &mut self,
            order_id: Uuid,
            total: Decimal,
        ) -> DatabaseResult<Order> {
            self.0.set_order_total(order_id, total).await
        }

        async fn clear_cart(&mut self, _cart_id: Uuid) -> DatabaseResult<u64> {
            Err(DatabaseError::Configuration("connection dropped".to_string()))
        }

        async fn commit(self: Box<Self>) -> DatabaseResult<()> {
            self.0.commit().await
        }
    }

    #[async_trait]
    impl OrderStore for FailingClear {
        async fn list_statuses(&self) -> DatabaseResult<Vec<OrderStatus>> {
            self.0.list_statuses().await
        }

        async fn get_status(&self, id: Uuid) -> DatabaseResult<Option<OrderStatus>> {
            self.0.get_status(id).await
        }

        async fn default_status(&self) -> DatabaseResult<Option<OrderStatus>> {
            self.0.default_status().await
        }

        async fn create_status(&self, new_status: &NewOrderStatus) -> DatabaseResult<OrderStatus> {
            self.0.create_status(new_status).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            changes: &OrderStatusChanges,
        ) -> DatabaseResult<Option<OrderStatus>> {
            self.0.update_status(id, changes).await
        }

        async fn delete_status(&self, id: Uuid) -> DatabaseResult<bool> {
            self.0.delete_status(id).await
        }

        async fn list_orders(
            &self,
            user_id: Uuid,
            page: PageRequest,
        ) -> DatabaseResult<(Vec<Order>, i64)> {
            self.0.list_orders(user_id, page).await
        }

        async fn get_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<Option<Order>> {
            self.0.get_order(user_id, id).await
        }

        async fn update_order(
            &self,
            user_id: Uuid,
            id: Uuid,
            changes: &OrderChanges,
        ) -> DatabaseResult<Option<Order>> {
            self.0.update_order(user_id, id, changes).await
        }

        async fn delete_order(&self, user_id: Uuid, id: Uuid) -> DatabaseResult<bool> {
            self.0.delete_order(user_id, id).await
        }

        async fn order_items(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
            self.0.order_items(order_id).await
        }

        async fn list_order_items(&self, user_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
            self.0.list_order_items(user_id).await
        }

        async fn get_order_item(
            &self,
            user_id: Uuid,
            id: Uuid,
        ) -> DatabaseResult<Option<OrderItem>> {
            self.0.get_order_item(user_id, id).await
        }

        async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> DatabaseResult<bool> {
            self.0.has_purchased(user_id, product_id).await
        }

        async fn begin_checkout(&self) -> DatabaseResult<Box<dyn CheckoutTx>> {
            let inner = self.0.begin_checkout().await?;
            Ok(Box::new(FailingCheckout(inner)))
        }
    }

    #[tokio::test]
    async fn failed_checkout_rolls_everything_back() {
        let shop = shop();
        let user = Uuid::new_v4();
        fill_cart(&shop, user).await;

        let failing = OrderService::new(Arc::new(FailingClear(shop.store.clone())));
        let err = failing
            .place_order(user, PlaceOrder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));

        let cart = shop.carts.cart_view(user).await.unwrap();
        assert_eq!(cart.total_items, 2);
        assert_eq!(cart.items.iter().map(|i| i.quantity).sum::<i32>(), 3);

        let orders = shop.orders.list_orders(user, first_page()).await.unwrap();
        assert_eq!(orders.count, 0);
        let items = shop.orders.list_order_items(user, first_page()).await.unwrap();
        assert_eq!(items.count, 0);
    }
}
