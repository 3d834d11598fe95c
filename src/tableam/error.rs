//! Errors surfaced through the routing layer.

use crate::heap::HeapError;
use crate::index::IndexError;

/// Errors from table access method operations.
#[derive(Debug, thiserror::Error)]
pub enum AmError {
    /// The relation's engine does not implement the operation.
    #[error("operation \"{operation}\" is not supported by table access method \"{engine}\"")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Engine name.
        engine: &'static str,
    },

    /// No engine is registered under the handler name.
    #[error("table access method \"{0}\" does not exist")]
    UnknownHandler(String),

    /// Heap engine error, passed through unchanged.
    #[error(transparent)]
    Heap(#[from] HeapError),

    /// Index error raised by an index-insertion callback.
    #[error(transparent)]
    Index(#[from] IndexError),
}
