//! # Serieskit - Tabular dataset import and transforms with error bars
//!
//! Serieskit reads delimited text into named numeric, date and text series,
//! then rewrites those series in place through a catalog of named transforms
//! that propagate error bars.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Parser    │────▶│   Import    │────▶│  Document   │
//! │ (any enc.)  │     │ (tokenize)  │     │ (directives)│     │  (named ds) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │ slots
//!                                         ┌─────────────┐     ┌──────▼──────┐
//!                                         │  Registry   │────▶│  Transform  │
//!                                         │  (catalog)  │     │  (in place) │
//!                                         └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serieskit::{handle, CsvImport, Document, ImportOptions, Registry, Role, Slots};
//!
//! let mut import = CsvImport::new(ImportOptions::default());
//! import.read_str("x,y,+-\n1,2,0.1\n2,4,0.2\n")?;
//!
//! let mut doc = Document::new();
//! import.set_data(&mut doc);
//!
//! let slots = Slots::new().with(Role::Y, doc.get_data("y").unwrap());
//! Registry::builtin()?.bind("MulY", slots)?.call(vec![10.0.into()])?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Datasets, roles, the slot array and the document store
//! - [`parser`] - Decoding and tokenizing with auto-detection
//! - [`import`] - Header directives, column typing and accumulation
//! - [`transform`] - Argument binding, error propagation and the registry
//! - [`geometry`] - Affine helpers used by the geometric transforms

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Import
pub mod import;

// Transformation
pub mod transform;
pub mod geometry;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    Error,
    ImportError,
    ImportResult,
    RegistryError,
    RegistryResult,
    Result,
    TransformError,
    TransformResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    handle,
    ds_code_to_idx,
    Dataset,
    Dataset1D,
    DatasetHandle,
    DatasetStore,
    Document,
    Role,
    Slots,
    TextDataset,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    tokenize,
    ColumnReader,
};
pub use parser::dates::date_string_to_date;

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use import::{Cell, ColumnType, CsvImport, ImportOptions};

// =============================================================================
// Re-exports - Transforms
// =============================================================================

pub use transform::{
    Arg,
    BoundTransform,
    Category,
    Operand,
    Param,
    Registry,
    ScalarFn,
    TransformInfo,
    TransformSpec,
};
