//! # Movie Catalog Core
//!
//! Shared building blocks for the movie catalog service.
//!
//! ## Modules
//!
//! - `error`: Error taxonomy with structured kinds
//! - `models`: Domain models for movies, ratings and listings
//! - `validation`: Input validation for catalog writes
//! - `database`: Shared PostgreSQL connection pool
//! - `observability`: Structured logging initialisation
//! - `config`: Configuration loading and validation
//! - `retry`: Linear backoff retry utility
//! - `pagination`: Opaque cursor codec for listings

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod observability;
pub mod pagination;
pub mod retry;
pub mod validation;

// Re-export commonly used types
pub use config::{load_dotenv, ConfigLoader, DatabaseConfig, RedisConfig, ServiceConfig};
pub use database::DatabasePool;
pub use error::{CatalogError, ErrorKind};
pub use models::{
    BoxOffice, CreateMovieRequest, Movie, MovieFilter, MoviePage, RankedMovie, Rating,
    RatingAggregate, RatingSubmission, Revenue,
};
pub use observability::{init_logging, LogConfig, LogFormat, ObservabilityError};
pub use pagination::{
    decode_cursor, decode_scoped_cursor, encode_cursor, encode_scoped_cursor,
    filter_fingerprint, DEFAULT_LIMIT,
};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
