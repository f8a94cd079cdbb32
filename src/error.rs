//! Error types for the polyroute routing engine.
//!
//! Routing failures never silently alter correctness: the router either
//! picks a valid placement or refuses to route the query, and every refusal
//! is typed here.

use thiserror::Error;

/// The primary error type for routing operations.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Query planning error (e.g. a table without any candidate placement).
    /// Fatal for the query, never for the router.
    #[error("Planning error: {message}")]
    Plan { message: String },

    /// Catalog error (unknown adapter, no data store available, etc.)
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Operation the router does not support
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Internal error (corrupted routing state, bug in the engine)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RouterError {
    /// Create a planning error.
    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, RouterError>;
