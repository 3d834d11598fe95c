//! Common header at the start of every page.
//!
//! The storage I/O layer never interprets it; page formats built on top
//! (the heap's slotted pages) read and write it through [`PageHeader`].

use super::{PAGE_SIZE, PageId};

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 24;

/// Page header stored at the beginning of each page.
///
/// Layout (24 bytes total):
/// - `page_lsn`: u64 - LSN of last modification, 0 while there is no WAL
/// - `flags`: u16 - page state flags
/// - `slot_count`: u16 - number of line pointers, including unused ones
/// - `free_start`: u16 - end of the line pointer array
/// - `free_end`: u16 - start of the tuple area
/// - `next_page`: u64 - next page of the same relation, `u64::MAX` if last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Log sequence number of the last change to this page.
    pub page_lsn: u64,
    /// Page state flags.
    pub flags: u16,
    /// Number of slots in the slot array.
    pub slot_count: u16,
    /// Offset where free space starts (end of slot array).
    pub free_start: u16,
    /// Offset where free space ends (start of record area).
    pub free_end: u16,
    /// Next page in the relation's page chain.
    pub next_page: Option<PageId>,
}

impl PageHeader {
    /// Creates a header for an empty data page.
    pub fn new_data_page() -> Self {
        Self {
            page_lsn: 0,
            flags: 0,
            slot_count: 0,
            free_start: PAGE_HEADER_SIZE as u16,
            free_end: PAGE_SIZE as u16,
            next_page: None,
        }
    }

    /// Returns the amount of contiguous free space available.
    pub fn free_space(&self) -> u16 {
        self.free_end.saturating_sub(self.free_start)
    }

    /// Reads a header from a page byte slice.
    pub fn read_from(data: &[u8]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&data[0..8]);
        let mut next = [0u8; 8];
        next.copy_from_slice(&data[16..24]);
        Self {
            page_lsn: u64::from_le_bytes(lsn),
            flags: u16_at(8),
            slot_count: u16_at(10),
            free_start: u16_at(12),
            free_end: u16_at(14),
            next_page: PageId::new(u64::from_le_bytes(next)).valid(),
        }
    }

    /// Writes the header to a page byte slice.
    pub fn write_to(&self, data: &mut [u8]) {
        let next = self.next_page.unwrap_or(PageId::INVALID);
        data[0..8].copy_from_slice(&self.page_lsn.to_le_bytes());
        data[8..10].copy_from_slice(&self.flags.to_le_bytes());
        data[10..12].copy_from_slice(&self.slot_count.to_le_bytes());
        data[12..14].copy_from_slice(&self.free_start.to_le_bytes());
        data[14..16].copy_from_slice(&self.free_end.to_le_bytes());
        data[16..24].copy_from_slice(&next.page_num().to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new_data_page() {
        let header = PageHeader::new_data_page();
        assert_eq!(header.slot_count, 0);
        assert_eq!(header.free_start, PAGE_HEADER_SIZE as u16);
        assert_eq!(header.free_end, PAGE_SIZE as u16);
        assert_eq!(header.next_page, None);
        assert_eq!(header.free_space(), (PAGE_SIZE - PAGE_HEADER_SIZE) as u16);
    }

    #[test]
    fn test_header_roundtrip_with_next_page() {
        let original = PageHeader {
            page_lsn: 0x1234_5678_9abc_def0,
            flags: 0x0102,
            slot_count: 42,
            free_start: 100,
            free_end: 8000,
            next_page: Some(PageId::new(7)),
        };

        let mut buf = vec![0u8; PAGE_HEADER_SIZE];
        original.write_to(&mut buf);
        assert_eq!(PageHeader::read_from(&buf), original);

        let last = PageHeader {
            next_page: None,
            ..original
        };
        last.write_to(&mut buf);
        assert_eq!(PageHeader::read_from(&buf).next_page, None);
    }
}
