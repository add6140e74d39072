//! Error types for the dynui engine.
//!
//! This module defines the centralized error type [`DynUiError`] and a type alias
//! [`Result`] for convenient error handling throughout the crate. All errors are
//! implemented using the `thiserror` crate for automatic `Error` trait implementation.
//!
//! Only two classes of failure are ever returned to callers: configuration
//! problems (fatal, surfaced before anything renders) and value resolution
//! failures (carrying the offending condition text). Everything else the engine
//! encounters at runtime (unknown actions, failing bus subscribers, broken
//! visibility expressions) is logged and degraded gracefully instead.

use crate::expression::ExpressionError;
use thiserror::Error;

/// The main error type for dynui operations.
///
/// # Examples
///
/// ```
/// use dynui::DynUiError;
///
/// fn validate(id: &str) -> Result<(), DynUiError> {
///     Err(DynUiError::DuplicateId(id.to_string()))
/// }
///
/// assert!(validate("title").is_err());
/// ```
#[derive(Debug, Error)]
pub enum DynUiError {
    /// Two nodes in the same schema share an id.
    ///
    /// Fatal configuration error: initialization aborts before any state is
    /// committed, and the interface must not render.
    #[error("Configuration error: duplicate node id `{0}`")]
    DuplicateId(String),

    /// Configuration is invalid or missing.
    ///
    /// Occurs when a configuration value is malformed or a required piece of
    /// the schema is absent. The string describes the specific problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema or snapshot JSON could not be parsed.
    #[error("Schema error: {0}")]
    Schema(#[from] serde_json::Error),

    /// Configuration TOML could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An expression failed outside of any resolution context.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Resolving a value condition failed.
    ///
    /// Always carries the original condition text so that schema authors can
    /// find the broken binding.
    #[error("failed to resolve condition `{condition}`: {source}")]
    Resolve {
        /// Condition text as configured (array alternatives joined with `||`).
        condition: String,
        /// Underlying evaluator failure.
        #[source]
        source: ExpressionError,
    },

    /// Resolution failed while computing a node's visibility.
    #[error("visibility of node `{id}`: {source}")]
    Visibility {
        /// Node whose `visibleOption` failed.
        id: String,
        /// Underlying resolution failure.
        #[source]
        source: Box<DynUiError>,
    },

    /// A node id was referenced that the schema does not contain.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// State snapshot persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A specialized `Result` type for dynui operations.
pub type Result<T> = std::result::Result<T, DynUiError>;
