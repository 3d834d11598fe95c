//! In-memory page storage.

use parking_lot::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageData, PageId};

/// In-memory page storage for tests and embedded use.
///
/// PageIds are assigned sequentially as Vec indices. An optional page limit
/// makes `allocate_page` fail with [`StorageError::StorageFull`].
pub struct MemoryStorage {
    pages: Mutex<Vec<PageData>>,
    max_pages: Option<u64>,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            max_pages: None,
        }
    }

    /// Creates a storage that refuses to grow beyond `max_pages`.
    pub fn with_max_pages(max_pages: u64) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            max_pages: Some(max_pages),
        }
    }
}

fn check_len(len: usize) -> Result<(), StorageError> {
    if len != PAGE_SIZE {
        return Err(StorageError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

impl Storage for MemoryStorage {
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        check_len(buf.len())?;
        let pages = self.pages.lock();
        let page = pages
            .get(page_id.page_num() as usize)
            .ok_or(StorageError::PageNotFound(page_id))?;
        buf.copy_from_slice(page.as_slice());
        Ok(())
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        check_len(buf.len())?;
        let mut pages = self.pages.lock();
        let page = pages
            .get_mut(page_id.page_num() as usize)
            .ok_or(StorageError::PageNotFound(page_id))?;
        page.as_mut_slice().copy_from_slice(buf);
        Ok(())
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut pages = self.pages.lock();
        if self.max_pages.is_some_and(|max| pages.len() as u64 >= max) {
            return Err(StorageError::StorageFull);
        }
        let page_id = PageId::new(pages.len() as u64);
        pages.push(PageData::new());
        Ok(page_id)
    }

    async fn page_count(&self) -> u64 {
        self.pages.lock().len() as u64
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
