//! Error types for the heap module.

use crate::datum::SerializationError;
use crate::storage::BufferPoolError;
use crate::tableam::{TableId, TupleId};

/// Errors from heap operations.
#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    /// Page is full, cannot insert data.
    #[error("page full: need {required} bytes, have {available} available")]
    PageFull {
        /// Bytes required for the tuple and slot.
        required: usize,
        /// Bytes available in free space.
        available: usize,
    },

    /// Tuple does not fit on an empty page.
    #[error("tuple of {size} bytes exceeds the maximum of {max}")]
    TupleTooLarge {
        /// Size of the tuple, header included.
        size: usize,
        /// Largest size a page can hold.
        max: usize,
    },

    /// Slot not found or out of range.
    #[error("slot {0} not found")]
    SlotNotFound(u16),

    /// No tuple at the given TID.
    #[error("tuple {0} not found")]
    TupleNotFound(TupleId),

    /// A tuple's bytes do not decode.
    #[error("corrupted tuple: {0}")]
    CorruptedTuple(String),

    /// A row lock could not be taken without waiting.
    #[error("could not obtain lock on row {tid} in relation {table}")]
    LockNotAvailable {
        /// Relation of the row.
        table: TableId,
        /// Row that is locked.
        tid: TupleId,
    },

    /// Multi-insert was asked to insert speculatively.
    #[error("speculative insertion is not supported by multi-insert")]
    SpeculativeMultiInsert,

    /// The tuple is not a pending speculative insertion of the caller.
    #[error("tuple {0} is not a speculative insertion")]
    NotSpeculative(TupleId),

    /// Row does not have the relation's number of columns.
    #[error("row has {actual} columns, relation has {expected}")]
    ColumnCountMismatch {
        /// Columns in the relation.
        expected: usize,
        /// Columns in the row.
        actual: usize,
    },

    /// A value does not match its column type.
    #[error("value for column {column} does not match its type")]
    TypeMismatch {
        /// Zero-based column number.
        column: usize,
    },

    /// An opaque tuple handle that was not produced by the heap.
    #[error("tuple handle does not belong to the heap access method")]
    WrongTupleType,

    /// A scan handle that was not produced by the heap.
    #[error("scan handle does not belong to the heap access method")]
    WrongScanType,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Buffer pool error.
    #[error(transparent)]
    BufferPool(#[from] BufferPoolError),
}
