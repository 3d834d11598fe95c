//! Tuple header for MVCC versioning.
//!
//! Each tuple stored in a heap page starts with a header that tracks:
//! - xmin/cmin: the transaction and command that inserted this version
//! - xmax/cmax: the transaction and command that deleted, updated or locked it
//! - infomask: commit/abort hint bits and version-chain flags
//! - ctid: this version's own TID, or the TID of its successor once updated

use std::fmt;

use super::error::HeapError;
use crate::storage::PageId;
use crate::tableam::TupleId;
use crate::tx::{CommandId, TxId};

/// Size of the tuple header in bytes.
///
/// 8 (xmin) + 8 (xmax) + 4 (cmin) + 4 (cmax) + 2 (infomask) + 8 + 2 (ctid) = 36.
pub const TUPLE_HEADER_SIZE: usize = 36;

/// Tuple header information mask (16-bit flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Infomask(u16);

impl Infomask {
    /// xmin transaction committed (hint bit).
    pub const XMIN_COMMITTED: u16 = 1 << 0;
    /// xmin transaction aborted, or the version was killed (hint bit).
    pub const XMIN_INVALID: u16 = 1 << 1;
    /// xmax transaction committed (hint bit).
    pub const XMAX_COMMITTED: u16 = 1 << 2;
    /// xmax is unset or its transaction aborted (hint bit).
    pub const XMAX_INVALID: u16 = 1 << 3;
    /// xmax only locks the version; it does not delete it.
    pub const XMAX_LOCK_ONLY: u16 = 1 << 4;
    /// The update or delete through xmax modified key columns.
    pub const KEYS_UPDATED: u16 = 1 << 5;
    /// This version was created by an UPDATE.
    pub const UPDATED: u16 = 1 << 6;
    /// The successor version is a heap-only tuple on this page.
    pub const HOT_UPDATED: u16 = 1 << 7;
    /// This version has no index entries of its own.
    pub const HEAP_ONLY: u16 = 1 << 8;
    /// Speculative insertion in progress; ctid holds the token.
    pub const SPECULATIVE: u16 = 1 << 9;

    const XMAX_HINTS: u16 = Self::XMAX_COMMITTED | Self::XMAX_INVALID;

    /// Create an empty infomask with no flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create an infomask from a raw u16 value (used for deserialization).
    pub const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    /// Get the raw u16 value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if every bit in `bits` is set.
    pub const fn contains(&self, bits: u16) -> bool {
        self.0 & bits == bits
    }

    /// Returns a copy with `bits` set.
    pub const fn with(self, bits: u16) -> Self {
        Self(self.0 | bits)
    }

    /// Returns a copy with `bits` cleared.
    pub const fn without(self, bits: u16) -> Self {
        Self(self.0 & !bits)
    }

    /// Merges newly learned hint bits.
    pub const fn merge(self, other: Infomask) -> Self {
        Self(self.0 | other.0)
    }

    /// Check if xmin is known committed.
    pub const fn xmin_committed(&self) -> bool {
        self.contains(Self::XMIN_COMMITTED)
    }

    /// Check if xmin is known aborted.
    pub const fn xmin_invalid(&self) -> bool {
        self.contains(Self::XMIN_INVALID)
    }

    /// Check if xmax is known committed.
    pub const fn xmax_committed(&self) -> bool {
        self.contains(Self::XMAX_COMMITTED)
    }

    /// Check if xmax is unset or known aborted.
    pub const fn xmax_invalid(&self) -> bool {
        self.contains(Self::XMAX_INVALID)
    }

    /// Check if xmax is a row lock only.
    pub const fn xmax_lock_only(&self) -> bool {
        self.contains(Self::XMAX_LOCK_ONLY)
    }

    /// Clears every xmax-related bit, ready for a new xmax.
    pub const fn reset_xmax(self) -> Self {
        self.without(Self::XMAX_HINTS | Self::XMAX_LOCK_ONLY | Self::KEYS_UPDATED | Self::HOT_UPDATED)
    }
}

impl fmt::Display for Infomask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Tuple header for MVCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleHeader {
    /// Transaction ID that inserted this version.
    pub xmin: TxId,
    /// Transaction ID that deleted, updated or locked this version.
    pub xmax: TxId,
    /// Command ID of the insert.
    pub cmin: CommandId,
    /// Command ID of the delete or update.
    pub cmax: CommandId,
    /// Information mask with hint bits and chain flags.
    pub infomask: Infomask,
    /// Own TID, successor TID, or speculative token.
    pub ctid: TupleId,
}

impl TupleHeader {
    /// Create a header for a freshly inserted version.
    ///
    /// ctid is filled in when the tuple is placed on a page.
    pub fn new_insert(xmin: TxId, cmin: CommandId) -> Self {
        Self {
            xmin,
            xmax: TxId::INVALID,
            cmin,
            cmax: CommandId::INVALID,
            infomask: Infomask::empty().with(Infomask::XMAX_INVALID),
            ctid: TupleId::new(PageId::INVALID, 0),
        }
    }

    /// Marks this header as a speculative insertion identified by `token`.
    pub fn set_speculative(&mut self, token: u32) {
        self.infomask = self.infomask.with(Infomask::SPECULATIVE);
        self.ctid = TupleId::new(PageId::new(token as u64), u16::MAX);
    }

    /// Returns the speculative insertion token, if this is a speculative insert.
    pub fn speculative_token(&self) -> Option<u32> {
        self.infomask
            .contains(Infomask::SPECULATIVE)
            .then_some(self.ctid.page_id.page_num() as u32)
    }

    /// Returns true if this version has been updated or deleted (not merely locked).
    pub fn is_modified(&self) -> bool {
        !self.infomask.xmax_invalid() && !self.infomask.xmax_lock_only() && !self.xmax.is_invalid()
    }

    /// Returns the successor TID when this version was updated, not deleted.
    pub fn successor(&self, own: TupleId) -> Option<TupleId> {
        (self.is_modified() && self.speculative_token().is_none() && self.ctid != own)
            .then_some(self.ctid)
    }

    /// Reads a tuple header from the start of `data`.
    pub fn read(data: &[u8]) -> Result<Self, HeapError> {
        if data.len() < TUPLE_HEADER_SIZE {
            return Err(HeapError::CorruptedTuple(format!(
                "tuple of {} bytes is shorter than its header",
                data.len()
            )));
        }
        let u64_at = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[at..at + 8]);
            u64::from_le_bytes(bytes)
        };
        let u32_at = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let u16_at = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);

        Ok(Self {
            xmin: TxId::new(u64_at(0)),
            xmax: TxId::new(u64_at(8)),
            cmin: CommandId::new(u32_at(16)),
            cmax: CommandId::new(u32_at(20)),
            infomask: Infomask::from_raw(u16_at(24)),
            ctid: TupleId::new(PageId::new(u64_at(26)), u16_at(34)),
        })
    }

    /// Writes the tuple header to the start of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() < TUPLE_HEADER_SIZE`.
    pub fn write(&self, data: &mut [u8]) {
        data[0..8].copy_from_slice(&self.xmin.as_u64().to_le_bytes());
        data[8..16].copy_from_slice(&self.xmax.as_u64().to_le_bytes());
        data[16..20].copy_from_slice(&self.cmin.as_u32().to_le_bytes());
        data[20..24].copy_from_slice(&self.cmax.as_u32().to_le_bytes());
        data[24..26].copy_from_slice(&self.infomask.as_u16().to_le_bytes());
        data[26..34].copy_from_slice(&self.ctid.page_id.page_num().to_le_bytes());
        data[34..36].copy_from_slice(&self.ctid.slot_id.to_le_bytes());
    }
}
