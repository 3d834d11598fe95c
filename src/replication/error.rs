//! Replication apply errors.

use crate::executor::ExecError;
use crate::index::IndexError;
use crate::tableam::{AmError, LockOutcome, TupleId};

/// Errors from applying replicated row changes.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// UPDATE or DELETE on a table that publishes it but has no replica
    /// identity.
    #[error("{message}")]
    MissingReplicaIdentity {
        /// Primary message.
        message: String,
        /// What to do about it.
        hint: &'static str,
    },

    /// The target relation cannot be written by apply.
    #[error("logical replication target relation \"{namespace}.{name}\" is not a table")]
    NotATable {
        /// Namespace of the relation.
        namespace: String,
        /// Relation name.
        name: String,
    },

    /// The replica index has a column that cannot be matched by value.
    #[error("replica identity index \"{index}\" has expression columns")]
    ExpressionKey {
        /// Index name.
        index: String,
    },

    /// A row matched under a dirty snapshot turned out invisible to the
    /// lock attempt.
    #[error("attempted to lock invisible tuple {0}")]
    InvisibleLock(TupleId),

    /// The lock attempt reported an outcome the locator cannot handle.
    #[error("unexpected lock outcome {outcome:?} for tuple {tid}")]
    UnexpectedLockOutcome {
        /// Row that was being locked.
        tid: TupleId,
        /// Reported outcome.
        outcome: LockOutcome,
    },

    /// The locator restarted more often than allowed.
    #[error("gave up locating row in relation \"{relation}\" after {retries} retries")]
    RetryLimitExceeded {
        /// Relation name.
        relation: String,
        /// Restarts made.
        retries: u32,
    },

    /// Executor error.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Table access method error.
    #[error(transparent)]
    Am(#[from] AmError),

    /// Index error.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ReplicationError {
    /// Corrective hint for the error, if it has one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ReplicationError::MissingReplicaIdentity { hint, .. } => Some(hint),
            _ => None,
        }
    }
}
