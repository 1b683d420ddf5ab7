//! Main application settings and configuration management

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use validator::Validate;

use crate::{AmlConfig, DatabaseConfig};

/// Main application settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppSettings {
    /// Application metadata
    #[validate(nested)]
    pub application: ApplicationConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// AML monitoring thresholds and jurisdiction settings
    #[validate(nested)]
    pub aml: AmlConfig,
}

/// Application metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplicationConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub version: String,

    #[validate(length(min = 1))]
    pub environment: String,
}

impl AppSettings {
    /// Load configuration from layered sources.
    ///
    /// Order of precedence, lowest first: `config/default.yaml`, the
    /// environment-specific file selected by `RUST_ENV`, `config/local.yaml`,
    /// then `PRODETECT_`-prefixed environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if Path::new("config/default.yaml").exists() {
            builder = builder.add_source(File::with_name("config/default").format(FileFormat::Yaml));
        }

        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        let env_config = format!("config/{}.yaml", env_name);
        if Path::new(&env_config).exists() {
            builder = builder
                .add_source(File::with_name(&format!("config/{}", env_name)).format(FileFormat::Yaml));
        }

        if Path::new("config/local.yaml").exists() {
            builder = builder.add_source(File::with_name("config/local").format(FileFormat::Yaml));
        }

        builder = builder.add_source(
            Environment::with_prefix("PRODETECT")
                .separator("__")
                .try_parsing(true),
        );

        let settings: AppSettings = builder.build()?.try_deserialize()?;

        settings
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;

        Ok(settings)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            application: ApplicationConfig {
                name: prodetect_common::app::NAME.to_string(),
                version: prodetect_common::app::VERSION.to_string(),
                environment: "development".to_string(),
            },
            database: DatabaseConfig::default(),
            aml: AmlConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.application.name, "ProDetect");
    }
}
