//! Core MVCC identifiers: TxId, CommandId and TxState.

use std::fmt;

/// Transaction ID (64-bit).
///
/// TxId 0 is reserved as INVALID and TxId 1 as FROZEN (always committed);
/// real transactions are numbered from 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(u64);

impl TxId {
    /// Invalid transaction ID (0).
    pub const INVALID: Self = Self(0);

    /// Bootstrap transaction that is committed for every snapshot.
    pub const FROZEN: Self = Self(1);

    /// Create a new transaction ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is an invalid transaction ID.
    pub const fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Command ID within a transaction (32-bit).
///
/// Orders statements within a transaction for intra-transaction visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u32);

impl CommandId {
    /// First command ID in a transaction.
    pub const FIRST: Self = Self(0);

    /// Placeholder stored in a tuple header before cmax is known.
    pub const INVALID: Self = Self(u32::MAX);

    /// Create a new command ID.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the next command ID.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Still running.
    InProgress,
    /// Committed; its effects are durable and visible to later snapshots.
    Committed,
    /// Rolled back; its effects are never visible.
    Aborted,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::InProgress => "in progress",
            TxState::Committed => "committed",
            TxState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
