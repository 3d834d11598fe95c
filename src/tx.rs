//! Transaction identifiers, transaction state, and snapshots.
//!
//! - Transaction ID allocation and lifecycle management
//! - Waiting for another transaction to finish
//! - Snapshots that fix which transactions' effects are visible

pub mod error;
pub mod manager;
pub mod snapshot;
pub mod types;

pub use error::TxError;
pub use manager::TransactionManager;
pub use snapshot::{DirtySnapshot, MvccSnapshot, Snapshot};
pub use types::{CommandId, TxId, TxState};
