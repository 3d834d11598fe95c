//! Shared vocabulary of the table access method interface.
//!
//! Everything here is engine-independent: tuple identifiers, row-lock modes
//! and wait policies, operation outcomes and the failure descriptor that
//! accompanies them, and the results of the visibility hooks.

use std::fmt;

use crate::datum::Value;
use crate::storage::PageId;
use crate::tx::{CommandId, TxId};

/// Slot number within a page.
pub type SlotId = u16;

/// Identifier of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical address (page, slot) of a tuple version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleId {
    /// Page containing the tuple.
    pub page_id: PageId,
    /// Slot within the page.
    pub slot_id: SlotId,
}

impl TupleId {
    /// A TID that addresses nothing.
    pub const INVALID: Self = Self {
        page_id: PageId::INVALID,
        slot_id: 0,
    };

    /// Creates a new tuple identifier.
    pub const fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }

    /// Returns false for [`INVALID`](Self::INVALID).
    pub fn is_valid(&self) -> bool {
        self.page_id != PageId::INVALID
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.page_id, self.slot_id)
    }
}

/// Row-level lock strength, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockTupleMode {
    /// Blocks only changes to key columns and deletes.
    KeyShare,
    /// Blocks every change.
    Share,
    /// Taken by updates that leave key columns alone.
    NoKeyExclusive,
    /// Taken by deletes and key-changing updates.
    Exclusive,
}

impl LockTupleMode {
    /// Returns true if a holder of `self` blocks a requester of `other`.
    pub fn conflicts_with(self, other: LockTupleMode) -> bool {
        use LockTupleMode::*;
        match (self, other) {
            (KeyShare, Exclusive) | (Exclusive, KeyShare) => true,
            (KeyShare, _) | (_, KeyShare) => false,
            (Share, Share) => false,
            _ => true,
        }
    }
}

impl fmt::Display for LockTupleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockTupleMode::KeyShare => "FOR KEY SHARE",
            LockTupleMode::Share => "FOR SHARE",
            LockTupleMode::NoKeyExclusive => "FOR NO KEY UPDATE",
            LockTupleMode::Exclusive => "FOR UPDATE",
        };
        f.write_str(name)
    }
}

/// What to do when a row lock is held by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWaitPolicy {
    /// Wait for the holder to finish.
    Block,
    /// Give up and report [`LockOutcome::WouldBlock`].
    Skip,
    /// Fail with a lock-not-available error.
    Error,
}

/// Outcome of lock, update and delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was taken (or the row was modified).
    Acquired,
    /// The version is not visible to the caller at all.
    Invisible,
    /// The caller's own transaction already modified the row.
    SelfUpdated,
    /// Another transaction updated or deleted the row.
    UpdatedByOther,
    /// A conflicting lock is held and the caller asked not to wait.
    WouldBlock,
}

/// Where a failed lock/update/delete stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateFailure {
    /// TID of the newest version, or the requested TID if the row was deleted.
    pub ctid: TupleId,
    /// Transaction that modified or locks the row.
    pub xmax: TxId,
    /// Command of the prior update; only for [`LockOutcome::SelfUpdated`].
    pub cmax: Option<CommandId>,
}

impl UpdateFailure {
    /// Returns true if the row at `tid` was deleted rather than updated.
    pub fn is_deleted(&self, tid: TupleId) -> bool {
        self.ctid == tid
    }
}

/// Result of a delete.
#[derive(Debug, Clone)]
pub struct DeleteResult {
    /// What happened.
    pub outcome: LockOutcome,
    /// Set for every outcome other than `Acquired`.
    pub failure: Option<UpdateFailure>,
}

/// Result of an update.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    /// What happened.
    pub outcome: LockOutcome,
    /// Set for every outcome other than `Acquired`.
    pub failure: Option<UpdateFailure>,
    /// Row lock strength the update required.
    pub lock_mode: LockTupleMode,
    /// TID of the new version on success.
    pub new_tid: Option<TupleId>,
    /// The new version needs no new index entries.
    pub hot: bool,
}

/// Options for insert and multi-insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    /// Insert speculatively, tagged with this token.
    pub speculative_token: Option<u32>,
}

impl InsertOptions {
    /// Options for a speculative insert.
    pub fn speculative(token: u32) -> Self {
        Self {
            speculative_token: Some(token),
        }
    }
}

/// Metadata that can be read from an opaque tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleField {
    /// Inserting transaction.
    CreatorXid,
    /// Updating or deleting transaction.
    UpdaterXid,
    /// Inserting command.
    CreationCid,
    /// The tuple's own TID.
    CurrentTid,
    /// The forward link of the update chain.
    ChainTid,
}

/// Value of a [`TupleField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleFieldValue {
    /// A transaction ID.
    Xid(TxId),
    /// A command ID.
    Cid(CommandId),
    /// A tuple ID.
    Tid(TupleId),
}

/// Equality qualifier applied by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanKey {
    /// Zero-based column number.
    pub column: usize,
    /// Value the column must equal. NULL never matches.
    pub value: Value,
}

impl ScanKey {
    /// Creates an equality key on `column`.
    pub fn eq(column: usize, value: Value) -> Self {
        Self { column, value }
    }

    /// Returns true if `values` satisfies this key.
    pub fn matches(&self, values: &[Value]) -> bool {
        match values.get(self.column) {
            Some(v) if !v.is_null() && !self.value.is_null() => *v == self.value,
            _ => false,
        }
    }
}

/// Result of checking a tuple against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotCheck {
    /// The version is visible.
    pub visible: bool,
    /// Dirty snapshots only: the inserter is still running.
    pub xmin_in_progress: Option<TxId>,
    /// Dirty snapshots only: a deleter or updater is still running.
    pub xmax_in_progress: Option<TxId>,
}

impl SnapshotCheck {
    /// A visible version with no running writer.
    pub const VISIBLE: Self = Self {
        visible: true,
        xmin_in_progress: None,
        xmax_in_progress: None,
    };

    /// An invisible version.
    pub const INVISIBLE: Self = Self {
        visible: false,
        xmin_in_progress: None,
        xmax_in_progress: None,
    };

    /// The running transaction a reader should wait for, if any.
    pub fn in_progress_writer(&self) -> Option<TxId> {
        self.xmin_in_progress.or(self.xmax_in_progress)
    }
}

/// Whether a version may be updated by a given transaction and command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCheck {
    /// Live and not being modified.
    MayBeUpdated,
    /// Not visible to the transaction.
    Invisible,
    /// Already modified by a later command of the same transaction.
    SelfUpdated {
        /// Command of that modification.
        cmax: CommandId,
    },
    /// Modified by a committed transaction.
    Updated,
    /// Being modified or locked by a running transaction.
    BeingUpdated(TxId),
}

/// Whether a version's space could be reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VacuumVerdict {
    /// Dead to everyone.
    Dead,
    /// Live.
    Live,
    /// Deleted, but some snapshot may still see it.
    RecentlyDead,
    /// Inserter still running.
    InsertInProgress,
    /// Deleter still running.
    DeleteInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use LockTupleMode::*;

    #[test]
    fn test_lock_conflict_table() {
        let modes = [KeyShare, Share, NoKeyExclusive, Exclusive];
        let expected = [
            // KeyShare, Share, NoKeyExclusive, Exclusive
            [false, false, false, true],
            [false, false, true, true],
            [false, true, true, true],
            [true, true, true, true],
        ];
        for (i, held) in modes.iter().enumerate() {
            for (j, requested) in modes.iter().enumerate() {
                assert_eq!(
                    held.conflicts_with(*requested),
                    expected[i][j],
                    "{held:?} vs {requested:?}"
                );
            }
        }
    }

    #[test]
    fn test_lock_modes_ordered() {
        assert!(KeyShare < Share && Share < NoKeyExclusive && NoKeyExclusive < Exclusive);
    }

    #[test]
    fn test_update_failure_is_deleted() {
        let tid = TupleId::new(PageId::new(1), 2);
        let deleted = UpdateFailure {
            ctid: tid,
            xmax: TxId::new(5),
            cmax: None,
        };
        assert!(deleted.is_deleted(tid));
        let updated = UpdateFailure {
            ctid: TupleId::new(PageId::new(1), 3),
            ..deleted
        };
        assert!(!updated.is_deleted(tid));
    }

    #[test]
    fn test_scan_key_nulls_never_match() {
        let key = ScanKey::eq(1, Value::Int32(3));
        assert!(key.matches(&[Value::Null, Value::Int32(3)]));
        assert!(!key.matches(&[Value::Null, Value::Null]));
        assert!(!key.matches(&[Value::Null]));
        assert!(!ScanKey::eq(0, Value::Null).matches(&[Value::Null]));
    }

    #[test]
    fn test_snapshot_check_writer() {
        let check = SnapshotCheck {
            visible: true,
            xmin_in_progress: None,
            xmax_in_progress: Some(TxId::new(9)),
        };
        assert_eq!(check.in_progress_writer(), Some(TxId::new(9)));
        assert_eq!(SnapshotCheck::VISIBLE.in_progress_writer(), None);
    }
}
