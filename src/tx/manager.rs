//! Transaction manager for MVCC.
//!
//! Manages transaction lifecycle: allocation of TxIds, tracking active
//! transactions, maintaining commit/abort state, and waking tasks that wait
//! for a transaction to finish.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::error::TxError;
use super::snapshot::{DirtySnapshot, MvccSnapshot, Snapshot};
use super::{CommandId, TxId, TxState};

/// Internal state protected by a single mutex to ensure atomicity
/// between txid allocation and active transaction tracking.
struct TxManagerState {
    /// Next transaction ID to allocate.
    next_txid: u64,
    /// Active (in-progress) transaction IDs for snapshot generation.
    active_txids: Vec<TxId>,
}

/// Transaction manager.
///
/// NOTE: Transaction state is volatile; there is no commit log.
pub struct TransactionManager {
    state: Mutex<TxManagerState>,
    tx_states: Mutex<HashMap<TxId, TxState>>,
    /// Signalled whenever any transaction commits or aborts.
    completion: Notify,
}

impl TransactionManager {
    /// Create a new transaction manager.
    pub fn new() -> Self {
        let mut tx_states = HashMap::new();
        tx_states.insert(TxId::FROZEN, TxState::Committed);

        Self {
            state: Mutex::new(TxManagerState {
                next_txid: 2, // 0=INVALID, 1=FROZEN
                active_txids: Vec::new(),
            }),
            tx_states: Mutex::new(tx_states),
            completion: Notify::new(),
        }
    }

    /// Begin a new transaction.
    pub fn begin(&self) -> TxId {
        let txid = {
            let mut state = self.state.lock();
            let txid = TxId::new(state.next_txid);
            state.next_txid += 1;
            state.active_txids.push(txid);
            txid
        };

        self.tx_states.lock().insert(txid, TxState::InProgress);
        txid
    }

    /// Commit a transaction.
    pub fn commit(&self, txid: TxId) -> Result<(), TxError> {
        self.complete(txid, TxState::Committed)
    }

    /// Abort a transaction.
    ///
    /// Hint bits are not touched here; readers set them lazily when they
    /// first see the aborted tuples.
    pub fn abort(&self, txid: TxId) -> Result<(), TxError> {
        self.complete(txid, TxState::Aborted)
    }

    fn complete(&self, txid: TxId, new_state: TxState) -> Result<(), TxError> {
        {
            let mut tx_states = self.tx_states.lock();
            match tx_states.get(&txid).copied() {
                Some(TxState::InProgress) => {
                    tx_states.insert(txid, new_state);
                }
                Some(current) => {
                    return Err(TxError::InvalidStateTransition {
                        txid,
                        current,
                        attempted: new_state,
                    });
                }
                None => return Err(TxError::TransactionNotFound(txid)),
            }
        }

        self.state.lock().active_txids.retain(|&t| t != txid);
        debug!(%txid, state = %new_state, "transaction finished");
        self.completion.notify_waiters();

        Ok(())
    }

    /// Get the state of a transaction.
    ///
    /// TxIds the manager never handed out (including INVALID) report
    /// `Aborted`: nothing they wrote can ever become visible.
    pub fn state(&self, txid: TxId) -> TxState {
        self.tx_states
            .lock()
            .get(&txid)
            .copied()
            .unwrap_or(TxState::Aborted)
    }

    /// Returns true if `txid` is still running.
    pub fn is_in_progress(&self, txid: TxId) -> bool {
        self.state(txid) == TxState::InProgress
    }

    /// Waits until `txid` commits or aborts.
    ///
    /// Returns immediately if it is not in progress.
    pub async fn wait_for(&self, txid: TxId) {
        loop {
            // Register before checking so a completion in between is not missed.
            let notified = self.completion.notified();
            if !self.is_in_progress(txid) {
                return;
            }
            notified.await;
        }
    }

    /// Take an MVCC snapshot for the given transaction and command.
    ///
    /// Captures the set of active transactions at this moment.
    pub fn snapshot(&self, current_txid: TxId, current_cid: CommandId) -> Snapshot {
        Snapshot::Mvcc(self.mvcc_snapshot(current_txid, current_cid))
    }

    /// Like [`snapshot`](Self::snapshot), returning the concrete MVCC snapshot.
    pub fn mvcc_snapshot(&self, current_txid: TxId, current_cid: CommandId) -> MvccSnapshot {
        let (xmax, xip) = {
            let state = self.state.lock();
            (TxId::new(state.next_txid), state.active_txids.to_vec())
        };

        // xmin = oldest active transaction, or current_txid if none active
        let xmin = xip.iter().min().copied().unwrap_or(current_txid);

        MvccSnapshot {
            xmin,
            xmax,
            xip,
            current_txid,
            current_cid,
        }
    }

    /// A snapshot that also sees in-progress versions of other transactions.
    pub fn dirty_snapshot(&self, current_txid: TxId) -> Snapshot {
        Snapshot::Dirty(DirtySnapshot { current_txid })
    }

    /// Oldest transaction any current snapshot may still consider running.
    pub fn oldest_xmin(&self) -> TxId {
        let state = self.state.lock();
        state
            .active_txids
            .iter()
            .min()
            .copied()
            .unwrap_or(TxId::new(state.next_txid))
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
