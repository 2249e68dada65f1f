//! Caller-facing errors for logical failures.
//!
//! These are raised through `anyhow::Error` like everything else in the
//! crate; callers that need to branch on them use
//! `err.downcast_ref::<DbError>()`.

use crate::access::value::DataType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Type mismatch for column '{column}': expected {expected}")]
    TypeMismatch { column: String, expected: DataType },

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Invalid integer literal '{0}'")]
    InvalidInteger(String),

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Row of {size} bytes exceeds the maximum of {max}")]
    RowTooLarge { size: usize, max: usize },
}
