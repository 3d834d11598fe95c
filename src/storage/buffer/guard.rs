//! RAII guards for page access.
//!
//! Every guard owns a pin, so the page is released on every exit path,
//! including early returns through `?`.

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

use super::frame::Frame;
use crate::storage::{PageData, PageId};

/// A pin on a resident page without a latch.
///
/// Holding a pin keeps the page resident; it does not protect the page's
/// contents. Dropping the pin unpins the page.
pub struct PagePin {
    frame: Arc<Frame>,
}

impl PagePin {
    /// Wraps a frame that has already been pinned by the pool.
    pub(super) fn new(frame: Arc<Frame>) -> Self {
        Self { frame }
    }

    /// Returns the `PageId` of the pinned page.
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    pub(super) fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }

    /// Takes a shared latch on the page, keeping this pin.
    pub async fn read(self) -> PageReadGuard {
        let data = self.frame.data.clone().read_owned().await;
        PageReadGuard { pin: self, data }
    }

    /// Takes an exclusive latch on the page, keeping this pin.
    pub async fn write(self) -> PageWriteGuard {
        let data = self.frame.data.clone().write_owned().await;
        PageWriteGuard {
            pin: self,
            data,
            is_dirty: false,
        }
    }
}

impl Drop for PagePin {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

impl std::fmt::Debug for PagePin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePin")
            .field("page_id", &self.page_id())
            .finish()
    }
}

/// Shared latch on a pinned page.
pub struct PageReadGuard {
    pin: PagePin,
    data: OwnedRwLockReadGuard<PageData>,
}

impl PageReadGuard {
    /// Returns the `PageId` of the guarded page.
    pub fn page_id(&self) -> PageId {
        self.pin.page_id()
    }

    /// Access the page data as a byte slice.
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Releases the latch but keeps the page pinned.
    pub fn unlatch(self) -> PagePin {
        let Self { pin, data } = self;
        drop(data);
        pin
    }
}

/// Exclusive latch on a pinned page.
///
/// Call [`mark_dirty`](Self::mark_dirty) after modifying the page so that the
/// change is written back by `flush_page`/`flush_all`.
pub struct PageWriteGuard {
    pin: PagePin,
    data: OwnedRwLockWriteGuard<PageData>,
    is_dirty: bool,
}

impl PageWriteGuard {
    /// Returns the `PageId` of the guarded page.
    pub fn page_id(&self) -> PageId {
        self.pin.page_id()
    }

    /// Access the page data as a byte slice.
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Access the page data as a mutable byte slice.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    /// Marks the page as modified.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Drop for PageWriteGuard {
    fn drop(&mut self) {
        if self.is_dirty {
            self.pin.frame().mark_dirty();
        }
    }
}
