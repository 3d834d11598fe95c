//! Index errors.

use crate::datum::SerializationError;

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A key has the wrong number of columns.
    #[error("index key has {actual} columns, expected {expected}")]
    KeyLength {
        /// Columns in the index.
        expected: usize,
        /// Columns in the key.
        actual: usize,
    },

    /// A unique index already has a live entry for the key.
    #[error("duplicate key value violates unique constraint \"{index}\"")]
    UniqueViolation {
        /// Index name.
        index: String,
        /// Rendered key.
        key: String,
    },

    /// The index has an expression column, which cannot be computed here.
    #[error("index \"{index}\" has expression columns")]
    ExpressionColumn {
        /// Index name.
        index: String,
    },

    /// Key encoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}
