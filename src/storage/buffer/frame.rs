//! Buffer pool frame holding one resident page.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::RwLock;

use crate::storage::{PageData, PageId};

/// A resident page.
///
/// - `pin_count` and `dirty` are atomics so guards can update them from `Drop`
/// - `data` is the page latch: shared for readers, exclusive for writers
pub(crate) struct Frame {
    page_id: PageId,
    pub(super) data: Arc<RwLock<PageData>>,
    dirty: AtomicBool,
    pin_count: AtomicU32,
}

impl Frame {
    pub fn new(page_id: PageId, data: PageData, dirty: bool) -> Self {
        Self {
            page_id,
            data: Arc::new(RwLock::new(data)),
            dirty: AtomicBool::new(dirty),
            pin_count: AtomicU32::new(0),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unpin(&self) {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unpin of unpinned page {}", self.page_id);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}
