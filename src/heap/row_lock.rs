//! Row-level locks taken by `lock_tuple`.
//!
//! Locks live outside the page so that taking one never dirties a page.
//! A lock is held until its transaction ends. The engine releases a
//! transaction's locks when it commits or aborts; owners that finished
//! without going through the engine are swept on the next acquire.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::tableam::{LockTupleMode, TableId, TupleId};
use crate::tx::{TransactionManager, TxId};

#[derive(Debug, Clone, Copy)]
struct RowLock {
    txid: TxId,
    mode: LockTupleMode,
}

/// Row locks of every relation served by one heap engine.
#[derive(Debug, Default)]
pub struct RowLockTable {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    locks: HashMap<(TableId, TupleId), Vec<RowLock>>,
    /// Rows each transaction holds a lock on.
    owned: HashMap<TxId, HashSet<(TableId, TupleId)>>,
}

impl Inner {
    fn release(&mut self, txid: TxId) -> usize {
        let Some(keys) = self.owned.remove(&txid) else {
            return 0;
        };
        for key in &keys {
            if let Some(holders) = self.locks.get_mut(key) {
                holders.retain(|l| l.txid != txid);
                if holders.is_empty() {
                    self.locks.remove(key);
                }
            }
        }
        keys.len()
    }

    fn sweep(&mut self, tx_manager: &TransactionManager) {
        let finished: Vec<TxId> = self
            .owned
            .keys()
            .copied()
            .filter(|&t| !tx_manager.is_in_progress(t))
            .collect();
        for txid in finished {
            self.release(txid);
        }
    }
}

impl RowLockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a running transaction other than `txid` whose lock on the row
    /// conflicts with `mode`.
    pub fn conflicting_holder(
        &self,
        table: TableId,
        tid: TupleId,
        txid: TxId,
        mode: LockTupleMode,
        tx_manager: &TransactionManager,
    ) -> Option<TxId> {
        let mut inner = self.inner.lock();
        inner.sweep(tx_manager);
        Self::find_conflict(inner.locks.get(&(table, tid))?, txid, mode)
    }

    /// Takes a lock of `mode` on the row for `txid`.
    ///
    /// Returns the conflicting holder instead if there is one. Re-locking in
    /// a weaker or equal mode is a no-op; a stronger mode upgrades the lock.
    pub fn try_acquire(
        &self,
        table: TableId,
        tid: TupleId,
        txid: TxId,
        mode: LockTupleMode,
        tx_manager: &TransactionManager,
    ) -> Result<(), TxId> {
        let mut inner = self.inner.lock();
        inner.sweep(tx_manager);
        let holders = inner.locks.entry((table, tid)).or_default();
        if let Some(holder) = Self::find_conflict(holders, txid, mode) {
            return Err(holder);
        }
        match holders.iter_mut().find(|l| l.txid == txid) {
            Some(own) => own.mode = own.mode.max(mode),
            None => holders.push(RowLock { txid, mode }),
        }
        inner.owned.entry(txid).or_default().insert((table, tid));
        Ok(())
    }

    /// Drops every lock held by `txid`. Returns how many rows it had locked.
    pub fn release(&self, txid: TxId) -> usize {
        self.inner.lock().release(txid)
    }

    /// Number of rows with at least one recorded lock.
    pub fn len(&self) -> usize {
        self.inner.lock().locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks currently recorded on the row (after purging finished holders).
    pub fn holders(
        &self,
        table: TableId,
        tid: TupleId,
        tx_manager: &TransactionManager,
    ) -> Vec<(TxId, LockTupleMode)> {
        let mut inner = self.inner.lock();
        inner.sweep(tx_manager);
        match inner.locks.get(&(table, tid)) {
            Some(holders) => holders.iter().map(|l| (l.txid, l.mode)).collect(),
            None => Vec::new(),
        }
    }

    fn find_conflict(holders: &[RowLock], txid: TxId, mode: LockTupleMode) -> Option<TxId> {
        holders
            .iter()
            .find(|l| l.txid != txid && l.mode.conflicts_with(mode))
            .map(|l| l.txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageId;

    const T: TableId = TableId(1);

    fn tid() -> TupleId {
        TupleId::new(PageId::new(0), 0)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let txm = TransactionManager::new();
        let locks = RowLockTable::new();
        let (a, b) = (txm.begin(), txm.begin());

        locks.try_acquire(T, tid(), a, LockTupleMode::Share, &txm).unwrap();
        locks.try_acquire(T, tid(), b, LockTupleMode::KeyShare, &txm).unwrap();
        assert_eq!(
            locks.try_acquire(T, tid(), b, LockTupleMode::Exclusive, &txm),
            Err(a)
        );
        assert_eq!(locks.holders(T, tid(), &txm).len(), 2);
    }

    #[test]
    fn test_own_locks_never_conflict_and_upgrade() {
        let txm = TransactionManager::new();
        let locks = RowLockTable::new();
        let a = txm.begin();

        locks.try_acquire(T, tid(), a, LockTupleMode::KeyShare, &txm).unwrap();
        locks.try_acquire(T, tid(), a, LockTupleMode::Exclusive, &txm).unwrap();
        assert_eq!(locks.holders(T, tid(), &txm), vec![(a, LockTupleMode::Exclusive)]);
        assert_eq!(
            locks.conflicting_holder(T, tid(), a, LockTupleMode::Exclusive, &txm),
            None
        );
    }

    #[test]
    fn test_finished_holders_are_purged() {
        let txm = TransactionManager::new();
        let locks = RowLockTable::new();
        let (a, b) = (txm.begin(), txm.begin());

        locks.try_acquire(T, tid(), a, LockTupleMode::Exclusive, &txm).unwrap();
        assert_eq!(
            locks.conflicting_holder(T, tid(), b, LockTupleMode::KeyShare, &txm),
            Some(a)
        );
        txm.commit(a).unwrap();
        assert_eq!(
            locks.conflicting_holder(T, tid(), b, LockTupleMode::Exclusive, &txm),
            None
        );
        assert!(locks.holders(T, tid(), &txm).is_empty());
        assert!(locks.is_empty());
    }

    #[test]
    fn test_release_drops_every_row_of_a_transaction() {
        let txm = TransactionManager::new();
        let locks = RowLockTable::new();
        let (a, b) = (txm.begin(), txm.begin());
        let other = TupleId::new(PageId::new(3), 7);

        locks.try_acquire(T, tid(), a, LockTupleMode::Share, &txm).unwrap();
        locks.try_acquire(T, other, a, LockTupleMode::Exclusive, &txm).unwrap();
        locks.try_acquire(T, tid(), b, LockTupleMode::KeyShare, &txm).unwrap();
        assert_eq!(locks.len(), 2);

        txm.commit(a).unwrap();
        assert_eq!(locks.release(a), 2);
        assert_eq!(locks.len(), 1);
        assert_eq!(locks.holders(T, tid(), &txm), vec![(b, LockTupleMode::KeyShare)]);
        assert_eq!(locks.release(a), 0);
    }

    #[test]
    fn test_acquire_sweeps_rows_never_examined_again() {
        let txm = TransactionManager::new();
        let locks = RowLockTable::new();

        for slot in 0..50 {
            let txid = txm.begin();
            let row = TupleId::new(PageId::new(0), slot);
            locks.try_acquire(T, row, txid, LockTupleMode::Exclusive, &txm).unwrap();
            txm.commit(txid).unwrap();
        }
        assert_eq!(locks.len(), 1);
    }
}
