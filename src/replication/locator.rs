//! Finding and locking the local row a replicated change refers to.
//!
//! A lookup runs under a dirty snapshot so that rows being written by
//! running transactions are seen. A match whose writer is still running is
//! waited out and the lookup restarts, since the row may change or vanish.
//! A stable match is then locked; if it was updated in the meantime the
//! lookup restarts again.

use tracing::{debug, info, warn};

use super::error::ReplicationError;
use crate::catalog::{IndexRelation, Relation};
use crate::config::LocatorConfig;
use crate::datum::Value;
use crate::executor::ExecState;
use crate::tableam::{
    AmError, LockOutcome, LockTupleMode, LockWaitPolicy, TableTuple, TupleField, TupleFieldValue, TupleId,
    TupleSlot, table_hot_search, table_lock_tuple, table_satisfies_snapshot, table_scan_begin, table_scan_end,
    table_scan_getnext, table_store_tuple, table_tuple_field,
};
use crate::tx::Snapshot;

/// How rows of a relation are looked up.
#[derive(Debug, Clone, Copy)]
pub enum LookupStrategy<'r> {
    /// Equality scan of the replica identity index.
    Indexed(&'r IndexRelation),
    /// Full scan comparing every column.
    Sequential,
}

/// Uses the replica identity index when the relation has one.
pub fn choose_strategy(rel: &Relation) -> LookupStrategy<'_> {
    match rel.replica_index() {
        Some(index) => LookupStrategy::Indexed(index),
        None => LookupStrategy::Sequential,
    }
}

/// Finds the row matching `search` and locks it in `mode`.
///
/// Returns the locked row's contents, or `None` if nothing matches.
pub async fn find_replica_tuple(
    state: &ExecState,
    rel: &Relation,
    mode: LockTupleMode,
    search: &[Value],
) -> Result<Option<TupleSlot>, ReplicationError> {
    match choose_strategy(rel) {
        LookupStrategy::Indexed(index) => find_by_index(state, rel, index, mode, search).await,
        LookupStrategy::Sequential => find_by_seq(state, rel, mode, search).await,
    }
}

/// Finds and locks the row whose `index` key equals that of `search`.
///
/// Only the key columns of `search` are consulted. A key containing NULL
/// matches nothing.
pub async fn find_by_index(
    state: &ExecState,
    rel: &Relation,
    index: &IndexRelation,
    mode: LockTupleMode,
    search: &[Value],
) -> Result<Option<TupleSlot>, ReplicationError> {
    let key = index.key_of(search).ok_or_else(|| ReplicationError::ExpressionKey {
        index: index.name.clone(),
    })?;
    locate(state, rel, mode, Probe::Index { index, key: &key }).await
}

/// Finds and locks the first row equal to `search` in every column.
pub async fn find_by_seq(
    state: &ExecState,
    rel: &Relation,
    mode: LockTupleMode,
    search: &[Value],
) -> Result<Option<TupleSlot>, ReplicationError> {
    locate(state, rel, mode, Probe::Sequential { search }).await
}

/// Column-wise binary equality of two rows.
pub fn rows_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.binary_eq(y))
}

enum Probe<'a> {
    Index { index: &'a IndexRelation, key: &'a [Value] },
    Sequential { search: &'a [Value] },
}

impl Probe<'_> {
    /// First version visible to `snapshot` that matches.
    async fn first_match(&self, rel: &Relation, snapshot: &Snapshot) -> Result<Option<TableTuple>, ReplicationError> {
        match self {
            Probe::Index { index, key } => {
                for tid in index.access.equality_scan(key)? {
                    if let Some(tuple) = table_hot_search(rel, tid, snapshot).await? {
                        return Ok(Some(tuple));
                    }
                }
                Ok(None)
            }
            Probe::Sequential { search } => {
                let mut scan = table_scan_begin(rel, snapshot.clone(), Vec::new()).await?;
                let mut slot = TupleSlot::default();
                let found = loop {
                    let Some(tuple) = table_scan_getnext(rel, &mut scan).await? else {
                        break None;
                    };
                    table_store_tuple(rel, &tuple, &mut slot)?;
                    if rows_equal(slot.values(), search) {
                        break Some(tuple);
                    }
                };
                table_scan_end(rel, scan)?;
                Ok(found)
            }
        }
    }
}

async fn locate(
    state: &ExecState,
    rel: &Relation,
    mode: LockTupleMode,
    probe: Probe<'_>,
) -> Result<Option<TupleSlot>, ReplicationError> {
    let config = *state.locator();
    let mut retries = 0;

    loop {
        let dirty = state.dirty_snapshot();
        let Some(tuple) = probe.first_match(rel, &dirty).await? else {
            debug!(table = %rel.name, "no matching row");
            return Ok(None);
        };

        let check = table_satisfies_snapshot(rel, &tuple, &dirty)?;
        if let Some(xid) = check.in_progress_writer() {
            warn!(table = %rel.name, %xid, "matching row is being written, waiting");
            state.tx_manager().wait_for(xid).await;
            retries = count_retry(rel, &config, retries)?;
            continue;
        }

        let tid = tuple_tid(rel, &tuple)?;
        let locked = table_lock_tuple(rel, tid, state.txid(), state.cid(), mode, LockWaitPolicy::Block).await?;
        match locked.outcome {
            LockOutcome::Acquired => {
                let tuple = locked.tuple.unwrap_or(tuple);
                let mut slot = TupleSlot::default();
                table_store_tuple(rel, &tuple, &mut slot)?;
                debug!(table = %rel.name, %tid, %mode, "locked replica row");
                return Ok(Some(slot));
            }
            LockOutcome::UpdatedByOther => {
                info!(table = %rel.name, %tid, "concurrent update, retrying");
                retries = count_retry(rel, &config, retries)?;
                if !config.retry_backoff.is_zero() {
                    tokio::time::sleep(config.retry_backoff).await;
                }
            }
            LockOutcome::Invisible => return Err(ReplicationError::InvisibleLock(tid)),
            outcome => return Err(ReplicationError::UnexpectedLockOutcome { tid, outcome }),
        }
    }
}

fn count_retry(rel: &Relation, config: &LocatorConfig, retries: u32) -> Result<u32, ReplicationError> {
    let retries = retries + 1;
    if let Some(max) = config.max_retries
        && retries > max
    {
        warn!(table = %rel.name, retries = max, "retry limit reached");
        return Err(ReplicationError::RetryLimitExceeded {
            relation: rel.name.clone(),
            retries: max,
        });
    }
    Ok(retries)
}

fn tuple_tid(rel: &Relation, tuple: &TableTuple) -> Result<TupleId, ReplicationError> {
    match table_tuple_field(rel, tuple, TupleField::CurrentTid)? {
        TupleFieldValue::Tid(tid) => Ok(tid),
        _ => Err(AmError::Unsupported {
            operation: "tuple_field",
            engine: rel.am().name(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_equal() {
        let a = vec![Value::Int32(1), Value::Null, Value::Float64(f64::NAN)];
        assert!(rows_equal(&a, &a.clone()));
        assert!(!rows_equal(&a, &a[..2]));
        assert!(!rows_equal(
            &[Value::Int32(1)],
            &[Value::Int64(1)]
        ));
        assert!(!rows_equal(&[Value::Null], &[Value::Int32(0)]));
        assert!(!rows_equal(&[Value::Float64(0.0)], &[Value::Float64(-0.0)]));
    }
}
