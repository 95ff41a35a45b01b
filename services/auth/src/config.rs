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
}

impl AppConfig {
    /// Load settings from defaults overlaid by environment variables
    ///
    /// # Environment Variables
    /// - `APP_HOST` (default: `0.0.0.0`)
    /// - `APP_PORT` (default: `3000`)
    /// - `JWT_SECRET`: shared HMAC secret
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: seconds (default: 3600)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: seconds (default: 86400)
    /// - `RUN_MIGRATIONS` (default: `true`)
    pub fn from_env() -> Result<Self> {
        common::settings::load(&[
            ("app_host", "0.0.0.0"),
            ("app_port", "3000"),
            ("jwt_secret", "change-me"),
            ("jwt_access_token_expiry", "3600"),
            ("jwt_refresh_token_expiry", "86400"),
            ("run_migrations", "true"),
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
    fn defaults_use_auth_port() {
        unsafe {
            std::env::remove_var("APP_PORT");
            std::env::remove_var("JWT_ACCESS_TOKEN_EXPIRY");
        }
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.bind_address(), format!("{}:3000", config.app_host));
        assert_eq!(config.jwt().access_token_expiry, 3600);
    }
}
