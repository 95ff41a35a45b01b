//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    jwt::JwtService,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::AccountStore,
    services::AccountService,
};

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub jwt_service: JwtService,
}

impl AppState {
    pub fn new(store: Arc<dyn AccountStore>, jwt_service: JwtService) -> Self {
        let rate_limiter = RateLimiter::new(RateLimiterConfig::default());
        Self {
            accounts: AccountService::new(store, jwt_service.clone(), rate_limiter),
            jwt_service,
        }
    }

    /// State over an in-memory store seeded with the default roles
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::repositories::MemoryAccountStore;
        use common::token::JwtConfig;

        let jwt_service = JwtService::new(JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 86400,
        });
        Self::new(Arc::new(MemoryAccountStore::with_default_roles()), jwt_service)
    }
}
