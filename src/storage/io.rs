//! Page I/O backends.

mod memory;

pub use memory::MemoryStorage;

use std::future::Future;

use crate::storage::{PageId, StorageError};

/// Storage backend for page-based I/O with caller-owned buffers.
///
/// Implementations only move raw 8KB pages; caching and latching are the
/// job of the [`BufferPool`](crate::storage::BufferPool).
pub trait Storage: Send + Sync {
    /// Reads a page into `buf` (exactly PAGE_SIZE bytes).
    fn read_page(
        &self,
        page_id: PageId,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Writes a page from `buf` (exactly PAGE_SIZE bytes).
    fn write_page(
        &self,
        page_id: PageId,
        buf: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Allocates a new zeroed page and returns its PageId.
    fn allocate_page(&self) -> impl Future<Output = Result<PageId, StorageError>> + Send;

    /// Returns the total number of allocated pages.
    fn page_count(&self) -> impl Future<Output = u64> + Send;

    /// Makes every completed write durable.
    fn sync_all(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}
