//! Heap page implementation using slotted page structure.
//!
//! ```text
//! +------------------+ offset 0
//! | PageHeader (24B) |
//! +------------------+ offset 24
//! | Slot Array       | (grows downward)
//! +------------------+
//! | Free Space       |
//! +------------------+
//! | Tuples           | (grows upward from bottom)
//! +------------------+ offset 8192
//! ```
//!
//! Every tuple is a [`TupleHeader`] followed by the serialized record. Slots
//! are never reused: a TID stays valid as a link in its update chain for the
//! life of the page.

use super::error::HeapError;
use super::tuple_header::{TUPLE_HEADER_SIZE, TupleHeader};
use crate::storage::{PAGE_HEADER_SIZE, PAGE_SIZE, PageHeader, PageId};
use crate::tableam::{SlotId, TupleId};

/// Size of each slot entry in bytes.
pub const SLOT_SIZE: usize = 4;

/// Largest tuple (header included) that fits on an empty page.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE - SLOT_SIZE;

/// A slot entry in the slot array.
///
/// Layout (4 bytes): `offset` u16, then `length` u16. `offset == 0` marks an
/// unused slot.
#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    offset: u16,
    length: u16,
}

impl SlotEntry {
    fn is_unused(&self) -> bool {
        self.offset == 0
    }

    fn read_from(data: &[u8]) -> Self {
        Self {
            offset: u16::from_le_bytes([data[0], data[1]]),
            length: u16::from_le_bytes([data[2], data[3]]),
        }
    }

    fn write_to(&self, data: &mut [u8]) {
        data[0..2].copy_from_slice(&self.offset.to_le_bytes());
        data[2..4].copy_from_slice(&self.length.to_le_bytes());
    }
}

/// A slotted heap page view over `T`.
///
/// `T` is `&[u8]` for reading or `&mut [u8]` for writing (any
/// `AsRef<[u8]>`, optionally `AsMut<[u8]>`).
pub struct HeapPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> HeapPage<T> {
    /// Creates a page view over the given data.
    ///
    /// # Panics
    ///
    /// Panics if `data.as_ref().len() != PAGE_SIZE`.
    pub fn new(data: T) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE, "HeapPage requires a full page");
        Self { data }
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::read_from(&self.data()[..PAGE_HEADER_SIZE])
    }

    /// Returns the next page of the relation, if any.
    pub fn next_page(&self) -> Option<PageId> {
        self.header().next_page
    }

    /// Returns the number of slots (used or not).
    pub fn slot_count(&self) -> u16 {
        self.header().slot_count
    }

    fn get_slot(&self, slot_id: SlotId) -> SlotEntry {
        let offset = PAGE_HEADER_SIZE + (slot_id as usize) * SLOT_SIZE;
        SlotEntry::read_from(&self.data()[offset..offset + SLOT_SIZE])
    }

    /// Returns the contiguous free space available for new tuples.
    pub fn free_space(&self) -> usize {
        self.header().free_space() as usize
    }

    /// Checks if a tuple with a `data_len`-byte record fits on this page.
    pub fn can_insert(&self, data_len: usize) -> bool {
        self.free_space() >= TUPLE_HEADER_SIZE + data_len + SLOT_SIZE
    }

    /// Reads the raw tuple bytes (header + record) in a slot.
    pub fn read(&self, slot_id: SlotId) -> Option<&[u8]> {
        if slot_id >= self.slot_count() {
            return None;
        }
        let slot = self.get_slot(slot_id);
        if slot.is_unused() {
            return None;
        }
        let start = slot.offset as usize;
        self.data().get(start..start + slot.length as usize)
    }

    /// Reads the tuple header and record bytes in a slot.
    pub fn tuple(&self, slot_id: SlotId) -> Result<Option<(TupleHeader, &[u8])>, HeapError> {
        match self.read(slot_id) {
            None => Ok(None),
            Some(raw) => {
                let header = TupleHeader::read(raw)?;
                Ok(Some((header, &raw[TUPLE_HEADER_SIZE..])))
            }
        }
    }

    /// Reads only the tuple header in a slot.
    pub fn get_header(&self, slot_id: SlotId) -> Result<Option<TupleHeader>, HeapError> {
        Ok(self.tuple(slot_id)?.map(|(header, _)| header))
    }

    /// Iterates over every stored tuple on the page.
    pub fn tuples(&self) -> impl Iterator<Item = Result<(SlotId, TupleHeader, &[u8]), HeapError>> {
        (0..self.slot_count()).filter_map(move |slot_id| {
            self.tuple(slot_id)
                .transpose()
                .map(|r| r.map(|(header, data)| (slot_id, header, data)))
        })
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> HeapPage<T> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Initializes this page as a new empty heap page.
    pub fn init(&mut self) {
        self.data_mut().fill(0);
        PageHeader::new_data_page().write_to(&mut self.data_mut()[..PAGE_HEADER_SIZE]);
    }

    fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data_mut()[..PAGE_HEADER_SIZE]);
    }

    /// Links this page to the next page of the relation.
    pub fn set_next_page(&mut self, next: Option<PageId>) {
        let mut header = self.header();
        header.next_page = next;
        self.set_header(&header);
    }

    /// Stores a tuple and returns its slot.
    ///
    /// Unless the header is speculative, its ctid is set to the tuple's own
    /// TID (`page_id`, new slot).
    ///
    /// # Errors
    ///
    /// Returns `HeapError::PageFull` if there is not enough space.
    pub fn insert_tuple(
        &mut self,
        page_id: PageId,
        mut header: TupleHeader,
        data: &[u8],
    ) -> Result<SlotId, HeapError> {
        let tuple_len = TUPLE_HEADER_SIZE + data.len();
        if !self.can_insert(data.len()) {
            return Err(HeapError::PageFull {
                required: tuple_len + SLOT_SIZE,
                available: self.free_space(),
            });
        }

        let mut page_header = self.header();
        let slot_id = page_header.slot_count;
        page_header.slot_count += 1;
        page_header.free_start += SLOT_SIZE as u16;
        page_header.free_end -= tuple_len as u16;
        let offset = page_header.free_end;

        if header.speculative_token().is_none() {
            header.ctid = TupleId::new(page_id, slot_id);
        }

        let start = offset as usize;
        header.write(&mut self.data_mut()[start..start + TUPLE_HEADER_SIZE]);
        self.data_mut()[start + TUPLE_HEADER_SIZE..start + tuple_len].copy_from_slice(data);

        let slot_offset = PAGE_HEADER_SIZE + (slot_id as usize) * SLOT_SIZE;
        SlotEntry {
            offset,
            length: tuple_len as u16,
        }
        .write_to(&mut self.data_mut()[slot_offset..slot_offset + SLOT_SIZE]);
        self.set_header(&page_header);

        Ok(slot_id)
    }

    /// Overwrites the tuple header in a slot.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::SlotNotFound` if the slot is unused or out of range.
    pub fn update_header(&mut self, slot_id: SlotId, header: &TupleHeader) -> Result<(), HeapError> {
        if slot_id >= self.slot_count() || self.get_slot(slot_id).is_unused() {
            return Err(HeapError::SlotNotFound(slot_id));
        }
        let start = self.get_slot(slot_id).offset as usize;
        header.write(&mut self.data_mut()[start..start + TUPLE_HEADER_SIZE]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{CommandId, TxId};

    fn create_page() -> Vec<u8> {
        let mut data = vec![0u8; PAGE_SIZE];
        HeapPage::new(&mut data[..]).init();
        data
    }

    #[test]
    fn test_insert_sets_own_ctid() {
        let mut data = create_page();
        let mut page = HeapPage::new(&mut data[..]);
        let page_id = PageId::new(4);

        let header = TupleHeader::new_insert(TxId::new(2), CommandId::FIRST);
        let slot0 = page.insert_tuple(page_id, header, b"hello").unwrap();
        let slot1 = page.insert_tuple(page_id, header, b"world!").unwrap();
        assert_eq!((slot0, slot1), (0, 1));

        let (h, body) = page.tuple(slot1).unwrap().unwrap();
        assert_eq!(h.ctid, TupleId::new(page_id, 1));
        assert_eq!(body, b"world!");
        assert_eq!(page.tuples().count(), 2);
    }

    #[test]
    fn test_speculative_keeps_token() {
        let mut data = create_page();
        let mut page = HeapPage::new(&mut data[..]);

        let mut header = TupleHeader::new_insert(TxId::new(2), CommandId::FIRST);
        header.set_speculative(9);
        let slot = page.insert_tuple(PageId::new(0), header, b"x").unwrap();
        let stored = page.get_header(slot).unwrap().unwrap();
        assert_eq!(stored.speculative_token(), Some(9));
    }

    #[test]
    fn test_page_full() {
        let mut data = create_page();
        let mut page = HeapPage::new(&mut data[..]);
        let header = TupleHeader::new_insert(TxId::new(2), CommandId::FIRST);
        let big = vec![7u8; 3000];

        page.insert_tuple(PageId::new(0), header, &big).unwrap();
        page.insert_tuple(PageId::new(0), header, &big).unwrap();
        let result = page.insert_tuple(PageId::new(0), header, &big);
        assert!(matches!(result, Err(HeapError::PageFull { .. })));
    }

    #[test]
    fn test_update_header() {
        let mut data = create_page();
        let mut page = HeapPage::new(&mut data[..]);
        let header = TupleHeader::new_insert(TxId::new(2), CommandId::FIRST);
        let slot = page.insert_tuple(PageId::new(0), header, b"abc").unwrap();

        let mut changed = page.get_header(slot).unwrap().unwrap();
        changed.xmax = TxId::new(5);
        page.update_header(slot, &changed).unwrap();
        assert_eq!(page.get_header(slot).unwrap().unwrap().xmax, TxId::new(5));
        assert_eq!(page.tuple(slot).unwrap().unwrap().1, b"abc");

        assert!(matches!(
            page.update_header(9, &changed),
            Err(HeapError::SlotNotFound(9))
        ));
    }

    #[test]
    fn test_next_page_link() {
        let mut data = create_page();
        let mut page = HeapPage::new(&mut data[..]);
        assert_eq!(page.next_page(), None);
        page.set_next_page(Some(PageId::new(8)));
        assert_eq!(page.next_page(), Some(PageId::new(8)));
    }
}
