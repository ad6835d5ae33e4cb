//! Catalog service configuration
//!
//! Composes the shared core configs with the box-office provider settings.

use std::time::Duration;

use movie_catalog_core::config::{
    parse_env_var, ConfigLoader, DatabaseConfig, RedisConfig, ServiceConfig,
};
use movie_catalog_core::retry::RetryPolicy;
use movie_catalog_core::CatalogError;
use url::Url;

/// Box-office provider configuration
///
/// # Environment Variables
///
/// - `CATALOG_BOXOFFICE_URL` (optional): provider base URL, absence disables enrichment
/// - `CATALOG_BOXOFFICE_API_KEY`: sent as `X-API-Key`
/// - `CATALOG_BOXOFFICE_MAX_RETRIES` (default: 3)
/// - `CATALOG_BOXOFFICE_BASE_DELAY_MS` (default: 100)
/// - `CATALOG_BOXOFFICE_MAX_DELAY_MS` (default: 1000)
/// - `CATALOG_BOXOFFICE_REQUEST_TIMEOUT_MS` (default: 5000)
/// - `CATALOG_BOXOFFICE_ENRICHMENT_TIMEOUT_MS` (default: 2000)
#[derive(Debug, Clone)]
pub struct BoxOfficeConfig {
    pub url: Option<String>,
    pub api_key: String,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
    /// Bound on the whole enrichment step of a movie creation, retries included
    pub enrichment_timeout: Duration,
}

impl Default for BoxOfficeConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: String::new(),
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_millis(5000),
            enrichment_timeout: Duration::from_millis(2000),
        }
    }
}

impl BoxOfficeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }
}

impl ConfigLoader for BoxOfficeConfig {
    fn from_env() -> Result<Self, CatalogError> {
        let defaults = BoxOfficeConfig::default();

        let url = std::env::var("CATALOG_BOXOFFICE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let api_key = std::env::var("CATALOG_BOXOFFICE_API_KEY").unwrap_or_default();

        let max_retries = parse_env_var("CATALOG_BOXOFFICE_MAX_RETRIES", defaults.max_retries)?;
        let base_delay_ms = parse_env_var(
            "CATALOG_BOXOFFICE_BASE_DELAY_MS",
            defaults.base_delay.as_millis() as u64,
        )?;
        let max_delay_ms = parse_env_var(
            "CATALOG_BOXOFFICE_MAX_DELAY_MS",
            defaults.max_delay.as_millis() as u64,
        )?;
        let request_timeout_ms = parse_env_var(
            "CATALOG_BOXOFFICE_REQUEST_TIMEOUT_MS",
            defaults.request_timeout.as_millis() as u64,
        )?;
        let enrichment_timeout_ms = parse_env_var(
            "CATALOG_BOXOFFICE_ENRICHMENT_TIMEOUT_MS",
            defaults.enrichment_timeout.as_millis() as u64,
        )?;

        Ok(Self {
            url,
            api_key,
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            enrichment_timeout: Duration::from_millis(enrichment_timeout_ms),
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if let Some(url) = &self.url {
            Url::parse(url).map_err(|e| CatalogError::ConfigurationError {
                message: format!("Invalid box office URL: {}", e),
                key: Some("CATALOG_BOXOFFICE_URL".to_string()),
            })?;
        }

        if self.request_timeout.is_zero() {
            return Err(CatalogError::ConfigurationError {
                message: "request timeout must be greater than 0".to_string(),
                key: Some("CATALOG_BOXOFFICE_REQUEST_TIMEOUT_MS".to_string()),
            });
        }

        if self.enrichment_timeout.is_zero() {
            return Err(CatalogError::ConfigurationError {
                message: "enrichment timeout must be greater than 0".to_string(),
                key: Some("CATALOG_BOXOFFICE_ENRICHMENT_TIMEOUT_MS".to_string()),
            });
        }

        if self.max_delay < self.base_delay {
            return Err(CatalogError::ConfigurationError {
                message: "max delay cannot be lower than base delay".to_string(),
                key: Some("CATALOG_BOXOFFICE_MAX_DELAY_MS".to_string()),
            });
        }

        Ok(())
    }
}

/// Complete catalog service configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub service: ServiceConfig,
    pub box_office: BoxOfficeConfig,
}

impl CatalogConfig {
    /// Load `.env`, read every section from the environment and validate it
    pub fn load() -> Result<Self, CatalogError> {
        movie_catalog_core::config::load_dotenv();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigLoader for CatalogConfig {
    fn from_env() -> Result<Self, CatalogError> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            service: ServiceConfig::from_env()?,
            box_office: BoxOfficeConfig::from_env()?,
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.service.validate()?;
        self.box_office.validate()
    }
}
