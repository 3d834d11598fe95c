//! Page identifier, size constants and page buffers.

mod header;

use std::fmt;

pub use header::{PAGE_HEADER_SIZE, PageHeader};

/// 8KB page size (aligned with OS page size and PostgreSQL standard).
pub const PAGE_SIZE: usize = 8192;

/// Identifier of a page within a [`Storage`](super::Storage) backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel used on disk for "no page" (end of a page chain).
    pub const INVALID: Self = Self(u64::MAX);

    /// Creates a new PageId from a page number.
    pub const fn new(page_num: u64) -> Self {
        Self(page_num)
    }

    /// Returns the page number.
    pub const fn page_num(&self) -> u64 {
        self.0
    }

    /// Returns `None` for the [`INVALID`](Self::INVALID) sentinel.
    pub const fn valid(self) -> Option<Self> {
        if self.0 == u64::MAX { None } else { Some(self) }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An owned, zero-initialized page buffer.
#[derive(Clone)]
pub struct PageData(Box<[u8; PAGE_SIZE]>);

impl PageData {
    /// Creates a zeroed page buffer.
    pub fn new() -> Self {
        Self(Box::new([0u8; PAGE_SIZE]))
    }

    /// Returns the page contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }

    /// Returns the page contents mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

impl Default for PageData {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageData").field("len", &PAGE_SIZE).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_valid() {
        assert_eq!(PageId::new(3).valid(), Some(PageId::new(3)));
        assert_eq!(PageId::INVALID.valid(), None);
    }

    #[test]
    fn test_page_data_zeroed() {
        let data = PageData::new();
        assert_eq!(data.as_slice().len(), PAGE_SIZE);
        assert!(data.as_slice().iter().all(|&b| b == 0));
    }
}
