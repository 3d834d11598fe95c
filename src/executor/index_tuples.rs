//! Index maintenance for rows written by the executor.

use async_trait::async_trait;
use tracing::debug;

use super::state::ExecState;
use crate::catalog::{IndexRelation, Relation};
use crate::datum::Value;
use crate::index::IndexError;
use crate::tableam::{
    AmError, IndexInserter, TupleField, TupleFieldValue, TupleId, table_hot_search, table_satisfies_snapshot,
    table_tuple_field,
};
use crate::tx::TxId;

/// A live row that holds the same unique key.
enum Conflict {
    /// Committed, or written by this transaction.
    Settled,
    /// Its inserter or deleter is still running.
    Pending(TxId),
}

/// Inserts entries into every index of a relation, enforcing unique
/// indexes.
///
/// Non-speculative inserts wait for a conflicting writer that is still
/// running and fail with a unique violation if the conflict survives.
/// Speculative inserts add their entries and report any conflict instead.
pub struct ExecIndexInserter<'a> {
    state: &'a ExecState,
}

impl<'a> ExecIndexInserter<'a> {
    pub fn new(state: &'a ExecState) -> Self {
        Self { state }
    }

    /// Looks for a live row other than `own` with `key` in `index`, under a
    /// dirty snapshot so running inserts are seen.
    async fn find_conflict(
        &self,
        rel: &Relation,
        index: &IndexRelation,
        key: &[Value],
        own: TupleId,
    ) -> Result<Option<Conflict>, AmError> {
        let dirty = self.state.dirty_snapshot();
        for tid in index.access.equality_scan(key)? {
            if tid == own {
                continue;
            }
            let Some(tuple) = table_hot_search(rel, tid, &dirty).await? else {
                continue;
            };
            if table_tuple_field(rel, &tuple, TupleField::CurrentTid)? == TupleFieldValue::Tid(own) {
                continue;
            }
            let check = table_satisfies_snapshot(rel, &tuple, &dirty)?;
            if !check.visible {
                continue;
            }
            return Ok(Some(match check.in_progress_writer() {
                Some(xid) => Conflict::Pending(xid),
                None => Conflict::Settled,
            }));
        }
        Ok(None)
    }

    /// Waits out running conflicting writers; fails if a live duplicate
    /// remains.
    async fn check_unique(
        &self,
        rel: &Relation,
        index: &IndexRelation,
        key: &[Value],
        own: TupleId,
    ) -> Result<(), AmError> {
        loop {
            match self.find_conflict(rel, index, key, own).await? {
                None => return Ok(()),
                Some(Conflict::Pending(xid)) => {
                    debug!(index = %index.name, %xid, "waiting for conflicting writer");
                    self.state.tx_manager().wait_for(xid).await;
                }
                Some(Conflict::Settled) => {
                    return Err(IndexError::UniqueViolation {
                        index: index.name.clone(),
                        key: render_key(rel, index, key),
                    }
                    .into());
                }
            }
        }
    }
}

#[async_trait]
impl IndexInserter for ExecIndexInserter<'_> {
    async fn insert_index_entries(
        &self,
        rel: &Relation,
        tid: TupleId,
        values: &[Value],
        speculative: bool,
    ) -> Result<bool, AmError> {
        let mut conflict = false;
        for index in &rel.indexes {
            let key = index.key_of(values).ok_or_else(|| IndexError::ExpressionColumn {
                index: index.name.clone(),
            })?;
            // NULLs never collide
            let checked = index.unique && !key.iter().any(Value::is_null);

            if speculative {
                index.access.insert(key.clone(), tid)?;
                if checked && self.find_conflict(rel, index, &key, tid).await?.is_some() {
                    debug!(table = %rel.name, index = %index.name, %tid, "speculative insert conflicts");
                    conflict = true;
                }
            } else {
                if checked {
                    self.check_unique(rel, index, &key, tid).await?;
                }
                index.access.insert(key, tid)?;
            }
            debug!(table = %rel.name, index = %index.name, %tid, "index entry inserted");
        }
        Ok(conflict)
    }
}

/// `(a, b)=(1, x)`
fn render_key(rel: &Relation, index: &IndexRelation, key: &[Value]) -> String {
    let names: Vec<_> = index
        .plain_columns()
        .map(|n| rel.columns.get(n).map_or("?", |c| c.name.as_str()))
        .collect();
    let values: Vec<_> = key.iter().map(ToString::to_string).collect();
    format!("({})=({})", names.join(", "), values.join(", "))
}
