//! Storage layer errors.

use thiserror::Error;

use crate::storage::PageId;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Page not found in storage.
    ///
    /// Pages must be created with `allocate_page` before they are read or written.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// Buffers passed to `read_page`/`write_page` must be exactly PAGE_SIZE bytes.
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size (PAGE_SIZE)
        expected: usize,
        /// Actual buffer size provided
        actual: usize,
    },

    /// I/O error from an underlying device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage is full (cannot allocate new pages).
    #[error("storage is full")]
    StorageFull,
}
