//! Application state shared across handlers

use common::token::TokenVerifier;
use std::sync::Arc;

use crate::{
    repositories::{CartStore, CatalogStore, OrderStore, ReviewStore},
    services::{CartService, CatalogService, OrderService, ReviewService},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub orders: OrderService,
    pub reviews: ReviewService,
    pub verifier: TokenVerifier,
    pub default_page_size: u32,
}

impl AppState {
    /// Wire every service to one store implementing all the store traits
    pub fn new<S>(store: S, verifier: TokenVerifier, default_page_size: u32) -> Self
    where
        S: CatalogStore + CartStore + OrderStore + ReviewStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), store.clone()),
            orders: OrderService::new(store.clone()),
            reviews: ReviewService::new(store.clone(), store.clone(), store),
            verifier,
            default_page_size,
        }
    }

    /// State over an in-memory store with the default order statuses
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::repositories::MemoryStore;
        use common::token::JwtConfig;

        let verifier = TokenVerifier::new(&JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 86400,
        });
        Self::new(MemoryStore::with_default_statuses(), verifier, 20)
    }
}
