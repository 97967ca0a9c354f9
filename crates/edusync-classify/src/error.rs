//! Schema validation errors.

use thiserror::Error;

/// Result type alias using [`SchemaError`].
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while loading or compiling a classification schema.
///
/// These are configuration errors: a run must refuse to start on any of
/// them rather than fall back to a built-in schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document could not be parsed.
    #[error("Invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A rule pattern failed to compile.
    #[error("Invalid pattern '{pattern}' in rule {index}: {message}")]
    Pattern {
        /// Zero-based rule index.
        index: usize,
        /// The offending pattern source.
        pattern: String,
        /// Compiler error detail.
        message: String,
    },

    /// The schema contains no rules.
    #[error("Schema '{0}' contains no rules")]
    Empty(String),

    /// Unknown built-in schema name.
    #[error("Unknown built-in schema: {0}")]
    UnknownBuiltin(String),
}
