//! Common error types for annograph

use thiserror::Error;

/// Common result type for annograph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across annograph crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error, including malformed tier setup
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tier string could not be segmented under its tier configuration
    #[error("Tokenization error on tier '{tier}': {reason}")]
    Tokenization { tier: String, reason: String },

    /// Cyclic or dangling supertype references between tiers
    #[error("Hierarchy error: {0}")]
    Hierarchy(String),

    /// A property value does not fit the kind of the attribute it resolves to
    #[error("Property '{property}' expects a {expected} value, got {found}")]
    PropertyMismatch {
        property: String,
        expected: String,
        found: String,
    },

    /// Requested tier or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
