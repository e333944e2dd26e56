//! Configuration loaded with Figment
//!
//! Sources, from lowest to highest precedence:
//! 1. Default values
//! 2. A TOML file, `./docservice.toml` unless another path is given
//! 3. Environment variables prefixed with `DOCSERVICE_`
//!
//! Nested keys are separated by a double underscore in environment variables, so
//! `DOCSERVICE_PAGINATION__LIMIT=50` sets `pagination.limit`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

use crate::{
    error::{ServiceError, ServiceResult},
    page::PaginationDefaults,
    registry::{ModelRegistry, ServiceFactory},
    service::{BULK_LIMIT, ServiceSettings},
};

/// File read by [`Config::load`].
pub const DEFAULT_CONFIG_FILE: &str = "docservice.toml";

/// Prefix of the environment variables read by [`Config`].
pub const ENV_PREFIX: &str = "DOCSERVICE_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        })
    }
}

/// Connection settings of the MongoDB backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub environment: Environment,

    /// `EnvFilter` directive, e.g. `info` or `docservice_core=debug`
    pub log_level: String,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Page and page size used when a listing request sets none
    pub pagination: PaginationDefaults,

    /// Page size of bulk operations without an explicit `limit`
    pub bulk_limit: u64,

    /// Whether services enforce ACL assertions
    pub acl_check: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongodb: Option<MongoConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: "info".to_string(),
            log_json: false,
            pagination: PaginationDefaults::default(),
            bulk_limit: BULK_LIMIT,
            acl_check: true,
            mongodb: None,
        }
    }
}

impl Config {
    /// Load configuration from `./docservice.toml` and the environment.
    pub fn load() -> ServiceResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file. A missing file is skipped.
    pub fn load_from(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let config: Config = Self::figment(path)
            .extract()
            .map_err(|err| ServiceError::Configuration(err.to_string()))?;

        config.validate()?;
        tracing::debug!(environment = %config.environment, "configuration loaded");

        Ok(config)
    }

    /// The layered sources [`Config::load_from`] extracts from.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn validate(&self) -> ServiceResult<()> {
        if self.pagination.page == 0 || self.pagination.limit == 0 {
            return Err(ServiceError::Configuration(
                "pagination page and limit must be positive".to_string(),
            ));
        }

        if self.bulk_limit == 0 {
            return Err(ServiceError::Configuration("bulk_limit must be positive".to_string()));
        }

        Ok(())
    }

    pub fn pagination_defaults(&self) -> PaginationDefaults {
        self.pagination
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            pagination: self.pagination,
            bulk_limit: self.bulk_limit,
            acl_check: self.acl_check,
        }
    }

    /// Builds a [`ServiceFactory`] applying these settings.
    pub fn factory(&self, registry: ModelRegistry) -> ServiceFactory {
        ServiceFactory::new(registry, self.service_settings())
    }
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        config.service_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from("missing.toml").map_err(|e| e.to_string())?;

            assert_eq!(config, Config::default());
            assert_eq!(config.pagination_defaults(), PaginationDefaults { page: 1, limit: 15 });
            assert_eq!(config.service_settings(), ServiceSettings::default());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "docservice.toml",
                r#"
                environment = "production"
                log_level = "debug"
                acl_check = false

                [pagination]
                limit = 30

                [mongodb]
                uri = "mongodb://localhost:27017"
                database = "gallery"
                "#,
            )?;
            jail.set_env("DOCSERVICE_PAGINATION__LIMIT", 50);
            jail.set_env("DOCSERVICE_BULK_LIMIT", 500);

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.environment, Environment::Production);
            assert_eq!(config.log_level, "debug");
            assert!(!config.acl_check);
            assert_eq!(config.pagination, PaginationDefaults { page: 1, limit: 50 });
            assert_eq!(config.bulk_limit, 500);
            assert_eq!(config.mongodb.as_ref().map(|m| m.database.as_str()), Some("gallery"));
            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("DOCSERVICE_ENVIRONMENT", "staging");

            let err = Config::load().unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
            Ok(())
        });
    }

    #[test]
    fn rejects_zero_limits() {
        Jail::expect_with(|jail| {
            jail.set_env("DOCSERVICE_PAGINATION__LIMIT", 0);

            assert!(Config::load().is_err());
            Ok(())
        });
    }
}
