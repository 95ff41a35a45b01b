//! Layered service settings
//!
//! Each service describes its settings as a flat `Deserialize` struct whose
//! field names match the lower-cased environment variable names
//! (`APP_PORT` -> `app_port`). Defaults are registered first and the
//! process environment is layered on top.

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::de::DeserializeOwned;

/// Build a settings struct from `defaults` overlaid by the environment.
pub fn load<T: DeserializeOwned>(defaults: &[(&str, &str)]) -> Result<T> {
    let mut builder = Config::builder();
    for (key, value) in defaults {
        builder = builder
            .set_default(*key, *value)
            .with_context(|| format!("invalid default for {}", key))?;
    }

    builder
        .add_source(Environment::default())
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("failed to parse configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;

    #[derive(Debug, Deserialize)]
    struct Sample {
        sample_port: u16,
        sample_name: String,
    }

    #[test]
    #[serial]
    fn defaults_apply_when_env_is_missing() {
        unsafe {
            std::env::remove_var("SAMPLE_PORT");
        }
        let settings: Sample =
            load(&[("sample_port", "3001"), ("sample_name", "api")]).unwrap();
        assert_eq!(settings.sample_port, 3001);
        assert_eq!(settings.sample_name, "api");
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        unsafe {
            std::env::set_var("SAMPLE_PORT", "8080");
        }
        let settings: Sample =
            load(&[("sample_port", "3001"), ("sample_name", "api")]).unwrap();
        assert_eq!(settings.sample_port, 8080);
        unsafe {
            std::env::remove_var("SAMPLE_PORT");
        }
    }
}
