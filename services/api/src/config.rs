//! Service configuration

use anyhow::Result;
use common::token::JwtConfig;
use serde::Deserialize;

/// Settings read from the environment at start-up
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_host: String,
    pub app_port: u16,
    pub jwt_secret: String,
    pub jwt_access_token_expiry: u64,
    pub jwt_refresh_token_expiry: u64,
    pub run_migrations: bool,
    pub default_page_size: u32,
}

impl AppConfig {
    /// Load settings from defaults overlaid by environment variables
    ///
    /// Same variables as the auth service plus `DEFAULT_PAGE_SIZE`
    /// (default: 20). `APP_PORT` defaults to 3001.
    pub fn from_env() -> Result<Self> {
        common::settings::load(&[
            ("app_host", "0.0.0.0"),
            ("app_port", "3001"),
            ("jwt_secret", "change-me"),
            ("jwt_access_token_expiry", "3600"),
            ("jwt_refresh_token_expiry", "86400"),
            ("run_migrations", "true"),
            ("default_page_size", "20"),
        ])
    }

    pub fn jwt(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            access_token_expiry: self.jwt_access_token_expiry,
            refresh_token_expiry: self.jwt_refresh_token_expiry,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn page_size_can_be_overridden() {
        unsafe {
            std::env::set_var("DEFAULT_PAGE_SIZE", "50");
            std::env::remove_var("APP_PORT");
        }
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.app_port, 3001);
        unsafe {
            std::env::remove_var("DEFAULT_PAGE_SIZE");
        }
    }
}
