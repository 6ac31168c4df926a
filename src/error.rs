//! Error types for structural contract violations
//!
//! Conversion never fails: malformed input degrades to a defined fallback.
//! The errors here cover caller contract violations (duplicate row ids,
//! mismatched column lengths) and registry/serialization faults, which fail
//! loudly at the point of violation.

use thiserror::Error;

/// Structural violations in the tabular model
#[derive(Debug, Error)]
pub enum TableError {
    /// A row with this identifier already exists in the table
    #[error("duplicate row id: {0}")]
    DuplicateRowId(String),

    /// Column arrays handed to `Table::from_columns` must all be equal length
    #[error("column '{name}' has {len} cells, expected {expected}")]
    ColumnLengthMismatch {
        name: String,
        len: usize,
        expected: usize,
    },

    /// Serialized table JSON did not carry the expected class tag
    #[error("expected class tag '{expected}', found '{found}'")]
    ClassTagMismatch { expected: String, found: String },
}

/// Failures raised by the parse contract
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Table(#[from] TableError),

    /// Header list and column list handed to a parser must line up
    #[error("{headers} headers for {columns} columns")]
    HeaderCountMismatch { headers: usize, columns: usize },
}

/// Failures in the store registry and store serialization
#[derive(Debug, Error)]
pub enum StoreError {
    /// No factory registered under the given name
    #[error("no store registered under name: {0}")]
    UnknownStoreType(String),

    #[error("malformed store JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Table(#[from] TableError),
}
