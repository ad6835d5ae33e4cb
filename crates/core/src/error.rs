//! Error taxonomy for the movie catalog
//!
//! Every failure carries an [`ErrorKind`] assigned where the failure is
//! detected. Callers (HTTP adapters, use cases) branch on the kind and never
//! on the rendered message.

use serde::Serialize;
use thiserror::Error;

/// Structured classification of a [`CatalogError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown title referenced by a read or a rating submission
    NotFound,
    /// Duplicate title on create
    Conflict,
    /// Malformed input: date, rating value, cursor, required field
    InvalidArgument,
    /// Missing or invalid caller credentials
    Unauthorized,
    /// Durable store unreachable
    Unavailable,
    /// Optional dependency (cache, ranking, enrichment) failed; never surfaced
    DegradedDependency,
    /// Invalid configuration
    Configuration,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code, used in error response bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthorized => "unauthorized",
            Self::Unavailable => "unavailable",
            Self::DegradedDependency => "degraded_dependency",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }
}

/// Main error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("Invalid {field}: {message}")]
    InvalidArgument { field: &'static str, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store unavailable while {operation}: {message}")]
    Unavailable { operation: &'static str, message: String },

    #[error("Dependency {dependency} degraded: {message}")]
    DegradedDependency {
        dependency: &'static str,
        message: String,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        key: Option<String>,
    },

    #[error("Internal error while {operation}: {message}")]
    Internal { operation: &'static str, message: String },
}

impl CatalogError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::DegradedDependency { .. } => ErrorKind::DegradedDependency,
            Self::ConfigurationError { .. } => ErrorKind::Configuration,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn movie_not_found(title: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "movie",
            key: title.into(),
        }
    }

    pub fn movie_conflict(title: impl Into<String>) -> Self {
        Self::Conflict {
            entity: "movie",
            key: title.into(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            message: message.into(),
        }
    }

    /// Malformed or mismatched pagination cursor
    pub fn invalid_cursor(message: impl Into<String>) -> Self {
        Self::invalid("cursor", message)
    }

    pub fn internal(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            operation,
            message: message.into(),
        }
    }

    /// Classify a sqlx failure raised while performing `operation`.
    ///
    /// Connectivity problems map to `Unavailable`, unique violations to
    /// `Conflict` and foreign key violations to `NotFound` on the movie
    /// identified by `key`.
    pub fn from_sqlx(operation: &'static str, key: &str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::movie_not_found(key),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable {
                operation,
                message: err.to_string(),
            },
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => Self::movie_conflict(key),
                Some(FOREIGN_KEY_VIOLATION) => Self::movie_not_found(key),
                _ => Self::internal(operation, err.to_string()),
            },
            _ => Self::internal(operation, err.to_string()),
        }
    }
}

/// PostgreSQL SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            CatalogError::movie_not_found("Alpha").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CatalogError::movie_conflict("Alpha").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CatalogError::invalid_cursor("bad").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            CatalogError::Unauthorized("missing token".into()).kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_sqlx_pool_timeout_is_unavailable() {
        let err = CatalogError::from_sqlx("listing movies", "", sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_sqlx_row_not_found_is_not_found() {
        let err = CatalogError::from_sqlx("loading movie", "Alpha", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "movie not found: Alpha");
    }

    #[test]
    fn test_display_is_not_used_for_classification() {
        // Same wording, different kinds
        let a = CatalogError::invalid("rating", "movie not found");
        assert_eq!(a.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::NotFound.code(), "not_found");
        assert_eq!(ErrorKind::InvalidArgument.code(), "invalid_argument");
    }
}
