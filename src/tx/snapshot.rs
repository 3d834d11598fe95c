//! Snapshots for MVCC isolation.
//!
//! A snapshot fixes which transactions' effects are visible. The predicates
//! that apply a snapshot to a tuple live with the tuple format, in
//! [`heap::visibility`](crate::heap::visibility).

use super::{CommandId, TxId};

/// Which versions a reader may see.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// Plain MVCC visibility as of the moment the snapshot was taken.
    Mvcc(MvccSnapshot),
    /// Committed and in-progress versions, as of the moment each tuple is
    /// examined. Used to detect concurrent writers.
    Dirty(DirtySnapshot),
    /// Every version, regardless of transaction state.
    Any,
}

impl Snapshot {
    /// The transaction that owns this snapshot, if any.
    pub fn current_txid(&self) -> Option<TxId> {
        match self {
            Snapshot::Mvcc(s) => Some(s.current_txid),
            Snapshot::Dirty(s) => Some(s.current_txid),
            Snapshot::Any => None,
        }
    }

    /// Returns true for a dirty snapshot.
    pub fn is_dirty(&self) -> bool {
        matches!(self, Snapshot::Dirty(_))
    }
}

/// MVCC snapshot.
///
/// Uses the same structure as PostgreSQL: xmin, xmax and the in-progress list.
///
/// # Transaction Visibility Ranges
///
/// - `txid < xmin`: **Past** (committed before snapshot, always visible)
/// - `xmin <= txid < xmax`: **Present** (check `xip` to determine if in-progress)
/// - `xmax <= txid`: **Future** (started after snapshot, always invisible)
#[derive(Debug, Clone)]
pub struct MvccSnapshot {
    /// Lower bound
    pub xmin: TxId,
    /// Upper bound
    pub xmax: TxId,
    /// Transactions in progress at snapshot time (invisible to this snapshot).
    pub xip: Vec<TxId>,
    /// Current transaction ID (for self-visibility).
    pub current_txid: TxId,
    /// Current command ID within the transaction.
    pub current_cid: CommandId,
}

impl MvccSnapshot {
    /// Check if a committed transaction's effects are visible to this snapshot.
    pub fn is_txid_visible(&self, txid: TxId) -> bool {
        if txid >= self.xmax {
            return false;
        }
        if txid < self.xmin {
            return true;
        }
        !self.xip.contains(&txid)
    }
}

/// Dirty snapshot: sees whatever is committed or still running right now.
#[derive(Debug, Clone)]
pub struct DirtySnapshot {
    /// Current transaction ID (for self-visibility).
    pub current_txid: TxId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_txid_visible_ranges() {
        let snapshot = MvccSnapshot {
            xmin: TxId::new(5),
            xmax: TxId::new(10),
            xip: vec![TxId::new(5), TxId::new(7)],
            current_txid: TxId::new(8),
            current_cid: CommandId::FIRST,
        };

        assert!(snapshot.is_txid_visible(TxId::new(4))); // past
        assert!(!snapshot.is_txid_visible(TxId::new(5))); // in xip
        assert!(snapshot.is_txid_visible(TxId::new(6))); // present, finished
        assert!(!snapshot.is_txid_visible(TxId::new(7))); // in xip
        assert!(!snapshot.is_txid_visible(TxId::new(10))); // future
    }

    #[test]
    fn test_current_txid() {
        let dirty = Snapshot::Dirty(DirtySnapshot {
            current_txid: TxId::new(3),
        });
        assert_eq!(dirty.current_txid(), Some(TxId::new(3)));
        assert!(dirty.is_dirty());
        assert_eq!(Snapshot::Any.current_txid(), None);
    }
}
