//! Buffer pool: resident pages keyed by PageId.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::BufferPoolError;
use super::frame::Frame;
use super::guard::{PagePin, PageReadGuard, PageWriteGuard};
use crate::storage::{PageData, PageId, Storage};

/// Page cache in front of a [`Storage`] backend.
///
/// Pages are loaded on first access and stay resident; the pool refuses to
/// load more than `capacity` pages. Dirty pages reach storage only through
/// [`flush_page`](Self::flush_page) and [`flush_all`](Self::flush_all).
///
/// # Thread Safety
///
/// - Multiple readers can latch the same page simultaneously
/// - Writers get exclusive access to their page
/// - The page table is protected by a mutex that is never held across I/O
pub struct BufferPool<S: Storage> {
    storage: S,
    page_table: Mutex<PageTable>,
    capacity: usize,
}

#[derive(Default)]
struct PageTable {
    frames: HashMap<PageId, Arc<Frame>>,
    /// Frames promised to `new_page` calls still allocating their page.
    reserved: usize,
}

impl PageTable {
    fn is_full(&self, capacity: usize) -> bool {
        self.frames.len() + self.reserved >= capacity
    }
}

impl<S: Storage> BufferPool<S> {
    /// Creates a buffer pool holding at most `capacity` pages.
    pub fn new(storage: S, capacity: usize) -> Self {
        Self {
            storage,
            page_table: Mutex::new(PageTable::default()),
            capacity,
        }
    }

    /// Returns the underlying storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Pins a page without latching it, loading it from storage if needed.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if the pool is at capacity
    /// - `BufferPoolError::Storage` if the page doesn't exist or I/O fails
    pub async fn pin_page(&self, page_id: PageId) -> Result<PagePin, BufferPoolError> {
        if let Some(pin) = self.pin_resident(page_id) {
            return Ok(pin);
        }

        let mut data = PageData::new();
        self.storage
            .read_page(page_id, data.as_mut_slice())
            .await?;

        let mut table = self.page_table.lock();
        // Another task may have loaded the page while we were reading it.
        if let Some(frame) = table.frames.get(&page_id) {
            frame.pin();
            return Ok(PagePin::new(frame.clone()));
        }
        if table.is_full(self.capacity) {
            return Err(BufferPoolError::NoFreeFrames {
                capacity: self.capacity,
            });
        }
        let frame = Arc::new(Frame::new(page_id, data, false));
        frame.pin();
        table.frames.insert(page_id, frame.clone());
        Ok(PagePin::new(frame))
    }

    fn pin_resident(&self, page_id: PageId) -> Option<PagePin> {
        let table = self.page_table.lock();
        table.frames.get(&page_id).map(|frame| {
            frame.pin();
            PagePin::new(frame.clone())
        })
    }

    /// Fetches a page with a shared latch.
    pub async fn fetch_page(&self, page_id: PageId) -> Result<PageReadGuard, BufferPoolError> {
        Ok(self.pin_page(page_id).await?.read().await)
    }

    /// Fetches a page with an exclusive latch.
    ///
    /// The page is NOT automatically marked dirty; call `mark_dirty()` on the
    /// guard after modifications.
    pub async fn fetch_page_mut(
        &self,
        page_id: PageId,
    ) -> Result<PageWriteGuard, BufferPoolError> {
        Ok(self.pin_page(page_id).await?.write().await)
    }

    /// Allocates a new zeroed page in storage and returns it latched for writing.
    pub async fn new_page(&self) -> Result<PageWriteGuard, BufferPoolError> {
        {
            let mut table = self.page_table.lock();
            if table.is_full(self.capacity) {
                return Err(BufferPoolError::NoFreeFrames {
                    capacity: self.capacity,
                });
            }
            table.reserved += 1;
        }
        let allocated = self.storage.allocate_page().await;

        let frame = {
            let mut table = self.page_table.lock();
            table.reserved -= 1;
            let page_id = allocated?;
            let frame = Arc::new(Frame::new(page_id, PageData::new(), true));
            frame.pin();
            table.frames.insert(page_id, frame.clone());
            frame
        };
        let mut guard = PagePin::new(frame).write().await;
        guard.mark_dirty();
        Ok(guard)
    }

    /// Writes a resident page back to storage if it is dirty.
    pub async fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame = self.page_table.lock().frames.get(&page_id).cloned();
        if let Some(frame) = frame {
            self.write_back(&frame).await?;
        }
        Ok(())
    }

    /// Writes every dirty page back to storage and syncs the backend.
    pub async fn flush_all(&self) -> Result<(), BufferPoolError> {
        let frames: Vec<Arc<Frame>> = self.page_table.lock().frames.values().cloned().collect();
        for frame in &frames {
            self.write_back(frame).await?;
        }
        self.storage.sync_all().await?;
        Ok(())
    }

    async fn write_back(&self, frame: &Frame) -> Result<(), BufferPoolError> {
        // Holding the shared latch keeps writers out while we copy the page.
        let data = frame.data.read().await;
        if frame.take_dirty() {
            if let Err(e) = self
                .storage
                .write_page(frame.page_id(), data.as_slice())
                .await
            {
                frame.mark_dirty();
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Returns the current pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_table.lock().frames.get(&page_id).map(|f| f.pin_count())
    }

    /// Returns whether a resident page has unflushed changes.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        self.page_table.lock().frames.get(&page_id).map(|f| f.is_dirty())
    }

    /// Returns the number of resident pages.
    pub fn resident_pages(&self) -> usize {
        self.page_table.lock().frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_new_page_then_fetch() {
        let pool = BufferPool::new(MemoryStorage::new(), 8);
        let mut guard = pool.new_page().await.unwrap();
        let page_id = guard.page_id();
        guard.data_mut()[0] = 42;
        drop(guard);

        let guard = pool.fetch_page(page_id).await.unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(pool.pin_count(page_id), Some(1));
        drop(guard);
        assert_eq!(pool.pin_count(page_id), Some(0));
    }

    #[tokio::test]
    async fn test_flush_writes_to_storage() {
        let pool = BufferPool::new(MemoryStorage::new(), 8);
        let mut guard = pool.new_page().await.unwrap();
        let page_id = guard.page_id();
        guard.data_mut()[10] = 7;
        drop(guard);
        assert_eq!(pool.is_dirty(page_id), Some(true));

        pool.flush_all().await.unwrap();
        assert_eq!(pool.is_dirty(page_id), Some(false));

        let mut buf = vec![0u8; crate::storage::PAGE_SIZE];
        pool.storage().read_page(page_id, &mut buf).await.unwrap();
        assert_eq!(buf[10], 7);
    }

    #[tokio::test]
    async fn test_pin_survives_unlatch() {
        let pool = BufferPool::new(MemoryStorage::new(), 8);
        let page_id = pool.new_page().await.unwrap().page_id();

        let pin = pool.fetch_page(page_id).await.unwrap().unlatch();
        assert_eq!(pool.pin_count(page_id), Some(1));

        // A writer can latch the page while it is only pinned.
        let mut writer = pool.fetch_page_mut(page_id).await.unwrap();
        writer.data_mut()[0] = 1;
        writer.mark_dirty();
        drop(writer);

        drop(pin);
        assert_eq!(pool.pin_count(page_id), Some(0));
    }

    #[tokio::test]
    async fn test_capacity_exhausted() {
        let pool = BufferPool::new(MemoryStorage::new(), 1);
        pool.new_page().await.unwrap();
        let result = pool.new_page().await;
        assert!(matches!(
            result,
            Err(BufferPoolError::NoFreeFrames { capacity: 1 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_new_pages_respect_capacity() {
        let pool = Arc::new(BufferPool::new(MemoryStorage::new(), 5));
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.new_page().await.map(|g| g.page_id()) })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, BufferPoolError::NoFreeFrames { capacity: 5 })),
            }
        }
        assert_eq!(created, 5);
        assert_eq!(pool.resident_pages(), 5);
    }

    #[tokio::test]
    async fn test_missing_page() {
        let pool = BufferPool::new(MemoryStorage::new(), 4);
        let result = pool.fetch_page(PageId::new(5)).await;
        assert!(matches!(result, Err(BufferPoolError::Storage(_))));
    }
}
