//! Pluggable table access methods.
//!
//! A relation names the storage engine that holds it; the engine is resolved
//! once through the [`AmRegistry`] into a shared [`TableAccessMethod`]. The
//! executor and replication apply only ever call the `table_*` functions,
//! which forward to that engine, so adding an engine touches no caller.
//!
//! Engine-specific tuples, scans and page pins cross this boundary only as
//! the opaque [`TableTuple`], [`TableScan`] and [`BufferPin`] handles.

mod error;
mod method;
mod registry;
mod route;
mod slot;
mod tuple;
mod types;

pub use error::AmError;
pub use method::{IndexInserter, TableAccessMethod};
pub use registry::AmRegistry;
pub use route::*;
pub use slot::TupleSlot;
pub use tuple::{BufferPin, FetchResult, LockResult, TableScan, TableTuple};
pub use types::{
    DeleteResult, InsertOptions, LockOutcome, LockTupleMode, LockWaitPolicy, ScanKey, SlotId, SnapshotCheck,
    TableId, TupleField, TupleFieldValue, TupleId, UpdateCheck, UpdateFailure, UpdateResult, VacuumVerdict,
};
