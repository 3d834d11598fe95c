//! The heap storage engine.
//!
//! Tables are unordered chains of slotted pages. Each row version is a
//! [`TupleHeader`] carrying its MVCC metadata followed by a [`Record`] of
//! column values. Updates never overwrite: the old version gets an xmax and
//! a forward link (ctid) to the new one.
//!
//! - [`HeapAm`]: the engine, registered as the `"heap"` access method
//! - [`HeapPage`]: slotted page layout
//! - [`visibility`]: the MVCC predicates
//! - [`RowLockTable`]: row-level locks
//! - [`HeapScan`]: sequential scans

mod access;
mod error;
mod handler;
mod modify;
mod page;
mod record;
mod row_lock;
mod scan;
mod tuple;
mod tuple_header;
pub mod visibility;

pub use access::HeapAm;
pub use error::HeapError;
pub use modify::HeapLockResult;
pub use page::{HeapPage, MAX_TUPLE_SIZE, SLOT_SIZE};
pub use record::Record;
pub use row_lock::RowLockTable;
pub use scan::HeapScan;
pub use tuple::HeapTuple;
pub use tuple_header::{Infomask, TUPLE_HEADER_SIZE, TupleHeader};
