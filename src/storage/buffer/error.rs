//! Buffer pool errors.

use thiserror::Error;

use crate::storage::StorageError;

/// Buffer pool errors.
#[derive(Debug, Error)]
pub enum BufferPoolError {
    /// The pool already holds its configured number of resident pages.
    #[error("buffer pool exhausted: {capacity} pages resident")]
    NoFreeFrames {
        /// Configured capacity in pages.
        capacity: usize,
    },

    /// Underlying storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
