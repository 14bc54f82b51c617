//! Unified application error types for MailHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Limit bookkeeping failures are
//! described by [`LimitError`] and keep their own [`ErrorKind`] so callers
//! can tell a misconfigured extension apart from a storage failure.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (duplicate entry, concurrent modification, etc.).
    Conflict,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A plugin (extension) error occurred.
    Plugin,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A limit kind was used without being registered.
    UnknownKind,
    /// A limit kind was registered twice with different defaults.
    DuplicateKind,
    /// The limit kind registry was used outside its lifecycle phase.
    Registry,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Plugin => write!(f, "PLUGIN"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::UnknownKind => write!(f, "UNKNOWN_KIND"),
            Self::DuplicateKind => write!(f, "DUPLICATE_KIND"),
            Self::Registry => write!(f, "REGISTRY"),
        }
    }
}

/// Errors raised by the limit kind registry and the accounting layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// The kind was never registered by any extension.
    #[error("unknown limit kind '{name}'")]
    UnknownKind {
        /// The offending kind name.
        name: String,
    },
    /// The kind is already registered with a different default maximum.
    #[error("limit kind '{name}' already registered with default {existing}, got {requested}")]
    DuplicateKind {
        /// The kind name.
        name: String,
        /// Default maximum already on record.
        existing: i64,
        /// Default maximum of the rejected registration.
        requested: i64,
    },
    /// Registration attempted after the initialization phase closed.
    #[error("limit kind registry is sealed, cannot register '{name}'")]
    RegistrySealed {
        /// The kind name.
        name: String,
    },
    /// Accounting attempted before the initialization phase completed.
    #[error("limit kind registry is not sealed yet")]
    RegistryNotSealed,
}

impl LimitError {
    /// The [`ErrorKind`] this error maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownKind { .. } => ErrorKind::UnknownKind,
            Self::DuplicateKind { .. } => ErrorKind::DuplicateKind,
            Self::RegistrySealed { .. } | Self::RegistryNotSealed => ErrorKind::Registry,
        }
    }
}

/// The unified application error used throughout MailHub.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire application boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a plugin error.
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Plugin, message)
    }

    /// Returns the [`LimitError`] behind this error, if any.
    pub fn as_limit_error(&self) -> Option<&LimitError> {
        self.source
            .as_ref()
            .and_then(|source| source.downcast_ref::<LimitError>())
    }

    /// Returns whether this error reports an unregistered limit kind.
    pub fn is_unknown_kind(&self) -> bool {
        self.kind == ErrorKind::UnknownKind
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<LimitError> for AppError {
    fn from(err: LimitError) -> Self {
        Self::with_source(err.kind(), err.to_string(), err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
