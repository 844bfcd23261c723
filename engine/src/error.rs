//! Error types for the serieskit engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ImportError`] - Reading and tokenizing delimited files
//! - [`TransformError`] - Usage errors when invoking a transform
//! - [`RegistryError`] - Transform catalog lookups
//! - [`Error`] - Top-level errors (CLI and document-level helpers)
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Data-shape problems (length mismatches, non-finite values, malformed
//! tokens in an import) are never reported here: they are absorbed by the
//! engine as documented behaviour.

use thiserror::Error;

use crate::models::Role;

// =============================================================================
// Import Errors
// =============================================================================

/// Errors while reading a delimited source.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown or undecodable text encoding.
    #[error("Failed to decode input: {0}")]
    Encoding(String),

    /// The tokenizer rejected the input.
    #[error("Invalid delimited data: {0}")]
    Csv(#[from] csv::Error),

    /// Delimiter or quote that the tokenizer cannot use.
    #[error("Delimiter and quote must be single ASCII characters, got '{0}'")]
    BadDelimiter(char),
}

// =============================================================================
// Transform Errors
// =============================================================================

/// Usage errors raised when binding or invoking a transform.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// Bad role code, missing/unknown argument or argument of the wrong kind.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The transform needs a dataset in a slot that is empty.
    #[error("No dataset bound to the {0} slot")]
    EmptySlot(Role),

    /// Arithmetic requested on a text dataset.
    #[error("Dataset in the {0} slot is not numeric")]
    NotNumeric(Role),
}

impl TransformError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the transform catalog.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// No transform registered under this name.
    #[error("Transform not found: {0}")]
    NotFound(String),

    /// A second transform was registered under an existing name.
    #[error("Transform already registered: {0}")]
    Duplicate(String),
}

// =============================================================================
// Top-level Errors
// =============================================================================

/// Top-level error wrapping all lower-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Import error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Transform invocation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Catalog lookup error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A dataset name that the document does not hold.
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for import operations.
pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Result type for transform invocations.
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Result type for catalog lookups.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Result type for top-level operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let err = RegistryError::NotFound("Frobnicate".into());
        let top: Error = err.into();
        assert!(top.to_string().contains("Frobnicate"));

        let err = TransformError::invalid("Unknown dataset code q");
        let top: Error = err.into();
        assert!(top.to_string().contains("Unknown dataset code q"));
    }

    #[test]
    fn test_slot_error_names_role() {
        let msg = TransformError::EmptySlot(Role::Size).to_string();
        assert!(msg.contains("size"));
    }
}
