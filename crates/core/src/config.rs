//! Shared configuration loader for the movie catalog
//!
//! All configuration is read from environment variables with the `CATALOG_`
//! prefix, after an optional `.env` file has been loaded.
//!
//! # Example
//!
//! ```no_run
//! use movie_catalog_core::config::{ConfigLoader, DatabaseConfig, RedisConfig, ServiceConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! movie_catalog_core::config::load_dotenv();
//!
//! let db_config = DatabaseConfig::from_env()?;
//! let redis_config = RedisConfig::from_env()?;
//! let service_config = ServiceConfig::from_env()?;
//!
//! db_config.validate()?;
//! redis_config.validate()?;
//! service_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::CatalogError;
use crate::observability::LogFormat;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration from
/// environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a required variable is missing or a
    /// value cannot be parsed.
    fn from_env() -> Result<Self, CatalogError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any validation check fails.
    fn validate(&self) -> Result<(), CatalogError>;
}

/// Database configuration
///
/// # Environment Variables
///
/// - `CATALOG_DATABASE_URL` (required, fallback `DATABASE_URL`): PostgreSQL connection URL
/// - `CATALOG_DATABASE_MAX_CONNECTIONS` (default: 100)
/// - `CATALOG_DATABASE_MIN_CONNECTIONS` (default: 10)
/// - `CATALOG_DATABASE_CONNECT_TIMEOUT` seconds (default: 30)
/// - `CATALOG_DATABASE_IDLE_TIMEOUT` seconds (default: 600)
/// - `CATALOG_DATABASE_MAX_LIFETIME` seconds (default: 3600)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections kept open
    pub min_connections: u32,
    /// Time allowed to acquire a connection
    pub connect_timeout: Duration,
    /// Idle connection timeout
    pub idle_timeout: Duration,
    /// Maximum lifetime of a pooled connection
    pub max_lifetime: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/movie_catalog".to_string(),
            max_connections: 100,
            min_connections: 10,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_env() -> Result<Self, CatalogError> {
        let defaults = DatabaseConfig::default();

        let url = std::env::var("CATALOG_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| CatalogError::ConfigurationError {
                message: "DATABASE_URL or CATALOG_DATABASE_URL must be set".to_string(),
                key: Some("CATALOG_DATABASE_URL".to_string()),
            })?;

        let max_connections =
            parse_env_var("CATALOG_DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        let min_connections =
            parse_env_var("CATALOG_DATABASE_MIN_CONNECTIONS", defaults.min_connections)?;
        let connect_timeout_secs = parse_env_var(
            "CATALOG_DATABASE_CONNECT_TIMEOUT",
            defaults.connect_timeout.as_secs(),
        )?;
        let idle_timeout_secs = parse_env_var(
            "CATALOG_DATABASE_IDLE_TIMEOUT",
            defaults.idle_timeout.as_secs(),
        )?;
        let max_lifetime_secs = parse_env_var(
            "CATALOG_DATABASE_MAX_LIFETIME",
            defaults.max_lifetime.as_secs(),
        )?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            max_lifetime: Duration::from_secs(max_lifetime_secs),
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        Url::parse(&self.url).map_err(|e| CatalogError::ConfigurationError {
            message: format!("Invalid DATABASE_URL: {}", e),
            key: Some("CATALOG_DATABASE_URL".to_string()),
        })?;

        if self.max_connections == 0 {
            return Err(CatalogError::ConfigurationError {
                message: "max_connections must be greater than 0".to_string(),
                key: Some("CATALOG_DATABASE_MAX_CONNECTIONS".to_string()),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(CatalogError::ConfigurationError {
                message: format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
                key: Some("CATALOG_DATABASE_MIN_CONNECTIONS".to_string()),
            });
        }

        if self.connect_timeout.as_secs() == 0 {
            return Err(CatalogError::ConfigurationError {
                message: "connect_timeout must be greater than 0 seconds".to_string(),
                key: Some("CATALOG_DATABASE_CONNECT_TIMEOUT".to_string()),
            });
        }

        Ok(())
    }
}

/// Redis configuration
///
/// Redis is optional: when no URL is configured the service runs with a
/// no-op cache and ranking index.
///
/// # Environment Variables
///
/// - `CATALOG_REDIS_URL` (optional, fallback `REDIS_URL`)
/// - `CATALOG_REDIS_CACHE_TTL` seconds (default: 900)
/// - `CATALOG_REDIS_CONNECTION_TIMEOUT` seconds (default: 5)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL, `None` disables caching
    pub url: Option<String>,
    /// TTL for cached movies and rating aggregates
    pub cache_ttl: Duration,
    /// Time allowed for the initial connection and ping
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            cache_ttl: Duration::from_secs(15 * 60),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl ConfigLoader for RedisConfig {
    fn from_env() -> Result<Self, CatalogError> {
        let defaults = RedisConfig::default();

        let url = std::env::var("CATALOG_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let cache_ttl_secs =
            parse_env_var("CATALOG_REDIS_CACHE_TTL", defaults.cache_ttl.as_secs())?;
        let connection_timeout_secs = parse_env_var(
            "CATALOG_REDIS_CONNECTION_TIMEOUT",
            defaults.connection_timeout.as_secs(),
        )?;

        Ok(Self {
            url,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            connection_timeout: Duration::from_secs(connection_timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if let Some(url) = &self.url {
            Url::parse(url).map_err(|e| CatalogError::ConfigurationError {
                message: format!("Invalid REDIS_URL: {}", e),
                key: Some("CATALOG_REDIS_URL".to_string()),
            })?;
        }

        if self.cache_ttl.as_secs() == 0 {
            return Err(CatalogError::ConfigurationError {
                message: "cache_ttl must be greater than 0 seconds".to_string(),
                key: Some("CATALOG_REDIS_CACHE_TTL".to_string()),
            });
        }

        Ok(())
    }
}

/// Service configuration
///
/// # Environment Variables
///
/// - `CATALOG_SERVICE_HOST` (default: "0.0.0.0", fallback `HOST`)
/// - `CATALOG_SERVICE_PORT` (default: 8000, fallback `PORT`)
/// - `CATALOG_SERVICE_WORKERS` (default: CPU count)
/// - `CATALOG_SERVICE_LOG_LEVEL` (default: "info", fallback `RUST_LOG`)
/// - `CATALOG_SERVICE_LOG_FORMAT` "pretty" or "json" (default: "json")
/// - `CATALOG_SERVICE_REQUEST_TIMEOUT` seconds (default: 30)
/// - `CATALOG_AUTH_TOKEN` bearer token required to create movies
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service bind host
    pub host: String,
    /// Service bind port
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Request timeout duration
    pub request_timeout: Duration,
    /// Bearer token for write endpoints
    pub auth_token: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: num_cpus::get(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            request_timeout: Duration::from_secs(30),
            auth_token: String::new(),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_env() -> Result<Self, CatalogError> {
        let defaults = ServiceConfig::default();

        let host = std::env::var("CATALOG_SERVICE_HOST")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or(defaults.host);

        let port = match std::env::var("CATALOG_SERVICE_PORT") {
            Ok(_) => parse_env_var("CATALOG_SERVICE_PORT", defaults.port)?,
            Err(_) => parse_env_var("PORT", defaults.port)?,
        };

        let workers = parse_env_var("CATALOG_SERVICE_WORKERS", defaults.workers)?;

        let log_level = std::env::var("CATALOG_SERVICE_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(defaults.log_level);

        let log_format = parse_env_var("CATALOG_SERVICE_LOG_FORMAT", defaults.log_format)?;

        let request_timeout_secs = parse_env_var(
            "CATALOG_SERVICE_REQUEST_TIMEOUT",
            defaults.request_timeout.as_secs(),
        )?;

        let auth_token = std::env::var("CATALOG_AUTH_TOKEN").unwrap_or_default();

        Ok(Self {
            host,
            port,
            workers,
            log_level,
            log_format,
            request_timeout: Duration::from_secs(request_timeout_secs),
            auth_token,
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.port == 0 {
            return Err(CatalogError::ConfigurationError {
                message: "port must be greater than 0".to_string(),
                key: Some("CATALOG_SERVICE_PORT".to_string()),
            });
        }

        if self.workers == 0 {
            return Err(CatalogError::ConfigurationError {
                message: "workers must be greater than 0".to_string(),
                key: Some("CATALOG_SERVICE_WORKERS".to_string()),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(CatalogError::ConfigurationError {
                message: format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                key: Some("CATALOG_SERVICE_LOG_LEVEL".to_string()),
            });
        }

        if self.request_timeout.as_secs() == 0 {
            return Err(CatalogError::ConfigurationError {
                message: "request_timeout must be greater than 0 seconds".to_string(),
                key: Some("CATALOG_SERVICE_REQUEST_TIMEOUT".to_string()),
            });
        }

        if self.auth_token.trim().is_empty() {
            return Err(CatalogError::ConfigurationError {
                message: "auth token must be set".to_string(),
                key: Some("CATALOG_AUTH_TOKEN".to_string()),
            });
        }

        Ok(())
    }
}

/// Parse an environment variable, falling back to `default` when unset
///
/// # Errors
///
/// Returns a `ConfigurationError` if the value cannot be parsed
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T, CatalogError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| CatalogError::ConfigurationError {
                    message: format!("Failed to parse {}: {}", key, e),
                    key: Some(key.to_string()),
                })
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// Does not fail when the file is missing.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
