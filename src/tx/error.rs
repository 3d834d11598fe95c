//! Transaction error types.

use thiserror::Error;

use super::types::{TxId, TxState};

/// Errors that can occur during transaction operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// Transaction not found in the transaction manager.
    #[error("transaction {0} not found")]
    TransactionNotFound(TxId),
    /// Invalid transaction state transition.
    #[error("invalid state transition for transaction {txid}: {current} -> {attempted}")]
    InvalidStateTransition {
        /// Transaction ID.
        txid: TxId,
        /// Current state.
        current: TxState,
        /// Attempted new state.
        attempted: TxState,
    },
}
