//! Executor errors.

use crate::index::IndexError;
use crate::tableam::{AmError, LockOutcome, TupleId};
use crate::trigger::TriggerError;

/// Errors from executing a row change.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// A NOT NULL column would be NULL.
    #[error("null value in column \"{column}\" of relation \"{relation}\" violates not-null constraint")]
    NotNullViolation {
        /// Relation name.
        relation: String,
        /// Column name.
        column: String,
    },

    /// A CHECK constraint evaluated to false.
    #[error("new row for relation \"{relation}\" violates check constraint \"{constraint}\"")]
    CheckViolation {
        /// Relation name.
        relation: String,
        /// Constraint name.
        constraint: String,
    },

    /// A row that was locked by this transaction could not be changed.
    #[error("tuple {tid} concurrently {operation}: {outcome:?}")]
    ConcurrentChange {
        /// "updated" or "deleted".
        operation: &'static str,
        /// Row that was targeted.
        tid: TupleId,
        /// What the engine reported.
        outcome: LockOutcome,
    },

    /// A row operation was given a slot that holds no stored row.
    #[error("slot does not hold a stored row")]
    UnstoredSlot,

    /// Error raised by a trigger.
    #[error(transparent)]
    Trigger(#[from] TriggerError),

    /// Error from the table access method.
    #[error(transparent)]
    Am(#[from] AmError),

    /// Error from an index.
    #[error(transparent)]
    Index(#[from] IndexError),
}
