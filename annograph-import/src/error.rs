//! Error types for annograph-import
//!
//! Hierarchy and configuration failures come through [`ImportError::Common`] and
//! are raised before either store is touched. A relational failure after the
//! graph load succeeded is reported as [`ImportError::PartialImport`]: nothing is
//! rolled back across the two stores, so the discourse must be removed and
//! imported again.

use crate::graph::GraphError;
use thiserror::Error;

/// Import pipeline error type
#[derive(Debug, Error)]
pub enum ImportError {
    /// Model, configuration or hierarchy error
    #[error(transparent)]
    Common(#[from] annograph_common::Error),

    /// Relational store error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Graph store error
    #[error("Graph store error: {0}")]
    Graph(#[from] GraphError),

    /// Graph was written but the relational write failed
    #[error("Partial import of discourse '{discourse}': graph loaded but relational write failed: {source}")]
    PartialImport {
        discourse: String,
        #[source]
        source: anyhow::Error,
    },

    /// Acoustic work requested on a corpus without sound files
    #[error("No sound files registered for corpus '{0}'")]
    NoSoundFiles(String),

    /// Query for an annotation type the graph has never seen
    #[error("The graph does not have any annotations of type '{name}'. Possible types are: {available}")]
    UnknownAnnotationType { name: String, available: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
