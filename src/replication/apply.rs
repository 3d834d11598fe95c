//! Applying replicated row changes.
//!
//! The `exec_simple_relation_*` functions run one row change with triggers,
//! constraints and index maintenance. The `apply_*` functions combine them
//! with the relation gates and, for UPDATE and DELETE, the replica tuple
//! locator.

use tracing::debug;

use super::error::ReplicationError;
use super::identity::{CmdType, check_cmd_replica_identity, check_subscription_relkind};
use super::locator::find_replica_tuple;
use crate::catalog::{Relation, TriggerEvent};
use crate::datum::Value;
use crate::executor::{ExecError, ExecState, check_constraints, fire_after_row, fire_before_row};
use crate::tableam::{
    IndexInserter, InsertOptions, LockOutcome, LockTupleMode, TupleId, TupleSlot, table_delete, table_insert,
    table_update,
};
use crate::trigger::TriggerAction;

/// What an apply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A row was inserted at this TID.
    Inserted(TupleId),
    /// The row was replaced by the version at this TID.
    Updated(TupleId),
    /// The row at this TID was deleted.
    Deleted(TupleId),
    /// A BEFORE trigger suppressed the change.
    Skipped,
    /// No row matched the search key.
    NotFound,
}

/// Inserts the slot's row, firing triggers and maintaining indexes.
///
/// Returns `None` if a BEFORE trigger suppressed the insert.
pub async fn exec_simple_relation_insert(
    state: &ExecState,
    rel: &Relation,
    slot: &mut TupleSlot,
) -> Result<Option<TupleId>, ReplicationError> {
    check_cmd_replica_identity(rel, CmdType::Insert)?;

    if fire_before_row(state, rel, TriggerEvent::Insert, None, Some(slot.values_mut()))? == TriggerAction::Skip {
        return Ok(None);
    }
    check_constraints(rel, slot.values())?;

    let indexer = state.index_inserter();
    let tid = table_insert(
        rel,
        slot,
        state.txid(),
        state.cid(),
        InsertOptions::default(),
        Some(&indexer as &dyn IndexInserter),
    )
    .await?;

    fire_after_row(state, rel, TriggerEvent::Insert, None, Some(slot.values()))?;
    Ok(Some(tid))
}

/// Replaces the row held by `searchslot` with the row in `slot`.
///
/// Returns the new version's TID, or `None` if a BEFORE trigger suppressed
/// the update.
pub async fn exec_simple_relation_update(
    state: &ExecState,
    rel: &Relation,
    searchslot: &TupleSlot,
    slot: &mut TupleSlot,
) -> Result<Option<TupleId>, ReplicationError> {
    check_cmd_replica_identity(rel, CmdType::Update)?;
    let tid = searchslot.tid.ok_or(ExecError::UnstoredSlot)?;
    let old_row = searchslot.values();

    if fire_before_row(state, rel, TriggerEvent::Update, Some(old_row), Some(slot.values_mut()))?
        == TriggerAction::Skip
    {
        return Ok(None);
    }
    check_constraints(rel, slot.values())?;

    let result = table_update(rel, tid, slot, state.txid(), state.cid(), None, true).await?;
    let (LockOutcome::Acquired, Some(new_tid)) = (result.outcome, result.new_tid) else {
        return Err(ExecError::ConcurrentChange {
            operation: "updated",
            tid,
            outcome: result.outcome,
        }
        .into());
    };

    if !result.hot {
        state
            .index_inserter()
            .insert_index_entries(rel, new_tid, slot.values(), false)
            .await?;
    }

    fire_after_row(state, rel, TriggerEvent::Update, Some(old_row), Some(slot.values()))?;
    Ok(Some(new_tid))
}

/// Deletes the row held by `searchslot`.
///
/// Returns false if a BEFORE trigger suppressed the delete.
pub async fn exec_simple_relation_delete(
    state: &ExecState,
    rel: &Relation,
    searchslot: &TupleSlot,
) -> Result<bool, ReplicationError> {
    check_cmd_replica_identity(rel, CmdType::Delete)?;
    let tid = searchslot.tid.ok_or(ExecError::UnstoredSlot)?;
    let old_row = searchslot.values();

    if fire_before_row(state, rel, TriggerEvent::Delete, Some(old_row), None)? == TriggerAction::Skip {
        return Ok(false);
    }

    let result = table_delete(rel, tid, state.txid(), state.cid(), None, true).await?;
    if result.outcome != LockOutcome::Acquired {
        return Err(ExecError::ConcurrentChange {
            operation: "deleted",
            tid,
            outcome: result.outcome,
        }
        .into());
    }

    fire_after_row(state, rel, TriggerEvent::Delete, Some(old_row), None)?;
    Ok(true)
}

/// Applies a replicated INSERT of `values`.
pub async fn apply_insert(
    state: &mut ExecState,
    rel: &Relation,
    values: Vec<Value>,
) -> Result<ApplyOutcome, ReplicationError> {
    check_subscription_relkind(rel.kind, &rel.namespace, &rel.name)?;

    let mut slot = TupleSlot::new(values);
    let outcome = match exec_simple_relation_insert(state, rel, &mut slot).await? {
        Some(tid) => ApplyOutcome::Inserted(tid),
        None => ApplyOutcome::Skipped,
    };
    state.next_command();
    debug!(table = %rel.name, ?outcome, "applied insert");
    Ok(outcome)
}

/// Applies a replicated UPDATE: finds the row matching `old_row` and
/// replaces it with `new_row`.
///
/// With an index lookup only the key columns of `old_row` are consulted.
pub async fn apply_update(
    state: &mut ExecState,
    rel: &Relation,
    old_row: &[Value],
    new_row: Vec<Value>,
) -> Result<ApplyOutcome, ReplicationError> {
    check_subscription_relkind(rel.kind, &rel.namespace, &rel.name)?;
    check_cmd_replica_identity(rel, CmdType::Update)?;

    let Some(located) = find_replica_tuple(state, rel, LockTupleMode::Exclusive, old_row).await? else {
        debug!(table = %rel.name, "row to update not found");
        return Ok(ApplyOutcome::NotFound);
    };

    let mut slot = TupleSlot::new(new_row);
    let outcome = match exec_simple_relation_update(state, rel, &located, &mut slot).await? {
        Some(tid) => ApplyOutcome::Updated(tid),
        None => ApplyOutcome::Skipped,
    };
    state.next_command();
    debug!(table = %rel.name, ?outcome, "applied update");
    Ok(outcome)
}

/// Applies a replicated DELETE of the row matching `old_row`.
pub async fn apply_delete(
    state: &mut ExecState,
    rel: &Relation,
    old_row: &[Value],
) -> Result<ApplyOutcome, ReplicationError> {
    check_subscription_relkind(rel.kind, &rel.namespace, &rel.name)?;
    check_cmd_replica_identity(rel, CmdType::Delete)?;

    let Some(located) = find_replica_tuple(state, rel, LockTupleMode::Exclusive, old_row).await? else {
        debug!(table = %rel.name, "row to delete not found");
        return Ok(ApplyOutcome::NotFound);
    };

    let outcome = match exec_simple_relation_delete(state, rel, &located).await? {
        true => ApplyOutcome::Deleted(located.tid.ok_or(ExecError::UnstoredSlot)?),
        false => ApplyOutcome::Skipped,
    };
    state.next_command();
    debug!(table = %rel.name, ?outcome, "applied delete");
    Ok(outcome)
}
