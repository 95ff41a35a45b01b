//! API models for stored rows, request payloads and response views

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

pub mod cart;
pub mod catalog;
pub mod order;
pub mod pagination;
pub mod review;

pub use cart::{
    AddCartItem, Cart, CartItem, CartItemView, CartLine, CartView, ProductSummary, UpdateCartItem,
};
pub use catalog::{
    Category, CategoryChanges, CategoryFilter, CategoryView, ImageChanges, ImageFilter,
    NewCategory, NewImage, NewProduct, Product, ProductChanges, ProductFilter, ProductImage,
    ProductOrdering, ProductView,
};
pub use order::{
    NewOrder, NewOrderItem, NewOrderStatus, Order, OrderChanges, OrderItem, OrderItemView,
    OrderStatus, OrderStatusChanges, OrderView, PlaceOrder,
};
pub use pagination::{Page, PageParams, PageRequest};
pub use review::{
    ApproveReviews, NewReview, Review, ReviewChanges, ReviewView, SetVerifiedPurchase,
};

/// Round to cents and keep a fixed scale of two
pub fn money(amount: Decimal) -> Decimal {
    let mut amount = amount.round_dp(2);
    amount.rescale(2);
    amount
}

/// Largest amount a `NUMERIC(10, 2)` column stores
pub fn max_money() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Tell an absent field (`None`) apart from an explicit `null` (`Some(None)`)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_has_two_decimal_places() {
        assert_eq!(money(Decimal::from_str("10.5").unwrap()).to_string(), "10.50");
        assert_eq!(money(Decimal::from_str("3.14159").unwrap()).to_string(), "3.14");
        assert_eq!(money(Decimal::from(7)).to_string(), "7.00");
    }
}
