//! Per-transaction execution state.

use std::sync::Arc;

use super::index_tuples::ExecIndexInserter;
use crate::config::LocatorConfig;
use crate::tx::{CommandId, Snapshot, TransactionManager, TxId};

/// The transaction, command and session a row change runs under.
///
/// Engine operations take the transaction and command ids explicitly; this
/// is where the executor keeps them.
#[derive(Clone)]
pub struct ExecState {
    tx_manager: Arc<TransactionManager>,
    txid: TxId,
    cid: CommandId,
    user: String,
    locator: LocatorConfig,
}

impl ExecState {
    /// Creates state for transaction `txid` running as `user`, starting at
    /// the first command.
    pub fn new(tx_manager: Arc<TransactionManager>, txid: TxId, user: impl Into<String>) -> Self {
        Self {
            tx_manager,
            txid,
            cid: CommandId::FIRST,
            user: user.into(),
            locator: LocatorConfig::default(),
        }
    }

    /// Sets the replica tuple locator tunables.
    pub fn with_locator_config(mut self, locator: LocatorConfig) -> Self {
        self.locator = locator;
        self
    }

    pub fn txid(&self) -> TxId {
        self.txid
    }

    pub fn cid(&self) -> CommandId {
        self.cid
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn tx_manager(&self) -> &Arc<TransactionManager> {
        &self.tx_manager
    }

    pub fn locator(&self) -> &LocatorConfig {
        &self.locator
    }

    /// Advances to the next command, making this transaction's earlier
    /// writes visible to later snapshots.
    pub fn next_command(&mut self) {
        self.cid = self.cid.next();
    }

    /// An MVCC snapshot taken now.
    pub fn snapshot(&self) -> Snapshot {
        self.tx_manager.snapshot(self.txid, self.cid)
    }

    /// A snapshot that also sees in-progress rows.
    pub fn dirty_snapshot(&self) -> Snapshot {
        self.tx_manager.dirty_snapshot(self.txid)
    }

    /// Index maintenance callback for writes made under this state.
    pub fn index_inserter(&self) -> ExecIndexInserter<'_> {
        ExecIndexInserter::new(self)
    }
}

impl std::fmt::Debug for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecState")
            .field("txid", &self.txid)
            .field("cid", &self.cid)
            .field("user", &self.user)
            .finish()
    }
}
