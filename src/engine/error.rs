//! Engine-level errors.

use crate::config::ConfigError;
use crate::heap::HeapError;
use crate::tableam::AmError;
use crate::tx::TxError;

/// Errors from engine setup and transaction control.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Access method error.
    #[error(transparent)]
    Am(#[from] AmError),

    /// Heap error.
    #[error(transparent)]
    Heap(#[from] HeapError),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(#[from] TxError),
}
