//! The index capability consumed by the executor and replication apply.
//!
//! Only two operations are needed: equality lookup by key and insertion of
//! a (key, TID) entry. Entries are never removed; dead entries are filtered
//! out by the heap's visibility checks when they are followed.

mod error;
mod memory;

pub use error::IndexError;
pub use memory::MemoryIndex;

use crate::datum::Value;
use crate::tableam::TupleId;

/// Access to one index's entries.
pub trait IndexAccess: Send + Sync {
    /// Adds an entry for `tid` under `key`.
    fn insert(&self, key: Vec<Value>, tid: TupleId) -> Result<(), IndexError>;

    /// Returns the TIDs of every entry whose key equals `key`.
    ///
    /// A key containing NULL matches nothing.
    fn equality_scan(&self, key: &[Value]) -> Result<Vec<TupleId>, IndexError>;
}
