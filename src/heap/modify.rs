//! Update, delete and row locking.
//!
//! All three share one shape: latch the page, decide with
//! [`satisfies_update`](super::visibility::satisfies_update) whether the
//! caller may touch the version, and either act under the latch or drop it
//! and wait for the transaction in the way before looking again.

use tracing::debug;

use super::access::{HeapAm, check_tuple_size, form_record};
use super::error::HeapError;
use super::page::HeapPage;
use super::record::Record;
use super::tuple::HeapTuple;
use super::tuple_header::{Infomask, TupleHeader};
use super::visibility;
use crate::catalog::Relation;
use crate::datum::Value;
use crate::storage::Storage;
use crate::tableam::{
    DeleteResult, LockOutcome, LockTupleMode, LockWaitPolicy, TupleId, UpdateCheck, UpdateFailure,
    UpdateResult,
};
use crate::tx::{CommandId, Snapshot, TxId};

/// A version that cannot be modified, and why.
struct Refusal {
    outcome: LockOutcome,
    failure: UpdateFailure,
}

/// Either a refusal or a transaction to wait for.
enum Blocked {
    Refused(Refusal),
    WaitFor(TxId),
}

/// Outcome of a row lock request.
#[derive(Debug)]
pub struct HeapLockResult {
    /// What happened.
    pub outcome: LockOutcome,
    /// The locked version on success.
    pub tuple: Option<HeapTuple>,
    /// Set for every outcome other than `Acquired`.
    pub failure: Option<UpdateFailure>,
}

impl<S: Storage> HeapAm<S> {
    /// Turns an update check into a refusal or a wait; `None` if the version
    /// may be modified.
    fn blocked(header: &TupleHeader, tid: TupleId, check: UpdateCheck) -> Option<Blocked> {
        let refuse = |outcome, ctid, cmax| {
            Some(Blocked::Refused(Refusal {
                outcome,
                failure: UpdateFailure {
                    ctid,
                    xmax: header.xmax,
                    cmax,
                },
            }))
        };
        match check {
            UpdateCheck::Invisible => refuse(LockOutcome::Invisible, tid, None),
            UpdateCheck::SelfUpdated { cmax } => refuse(LockOutcome::SelfUpdated, header.ctid, Some(cmax)),
            UpdateCheck::Updated => refuse(LockOutcome::UpdatedByOther, header.ctid, None),
            UpdateCheck::BeingUpdated(xid) => Some(Blocked::WaitFor(xid)),
            UpdateCheck::MayBeUpdated => None,
        }
    }

    /// Checks a version that passed `satisfies_update` against the row-lock
    /// table and the crosscheck snapshot.
    fn check_modifiable(
        &self,
        rel: &Relation,
        tid: TupleId,
        header: &TupleHeader,
        txid: TxId,
        mode: LockTupleMode,
        crosscheck: Option<&Snapshot>,
    ) -> Option<Blocked> {
        if let Some(holder) = self
            .row_locks
            .conflicting_holder(rel.id, tid, txid, mode, &self.tx_manager)
        {
            return Some(Blocked::WaitFor(holder));
        }
        if let Some(snapshot) = crosscheck {
            let (check, _) = visibility::satisfies(header, snapshot, &self.tx_manager);
            if !check.visible {
                return Some(Blocked::Refused(Refusal {
                    outcome: LockOutcome::UpdatedByOther,
                    failure: UpdateFailure {
                        ctid: header.ctid,
                        xmax: header.xmax,
                        cmax: None,
                    },
                }));
            }
        }
        None
    }

    async fn wait_or_block(&self, rel: &Relation, tid: TupleId, xid: TxId, wait: bool) -> Option<Refusal> {
        if !wait {
            return Some(Refusal {
                outcome: LockOutcome::WouldBlock,
                failure: UpdateFailure {
                    ctid: tid,
                    xmax: xid,
                    cmax: None,
                },
            });
        }
        debug!(table = %rel.name, %tid, xid = %xid, "waiting for concurrent transaction");
        self.tx_manager.wait_for(xid).await;
        None
    }

    /// Replaces the version at `otid` with `values`.
    ///
    /// The new version stays on the same page as a heap-only tuple when no
    /// indexed column changes and it fits; the caller must then skip index
    /// maintenance (`hot` in the result).
    #[allow(clippy::too_many_arguments)]
    pub async fn update_row(
        &self,
        rel: &Relation,
        otid: TupleId,
        values: &[Value],
        txid: TxId,
        cid: CommandId,
        crosscheck: Option<&Snapshot>,
        wait: bool,
    ) -> Result<UpdateResult, HeapError> {
        let new_data = form_record(rel, values)?;
        check_tuple_size(&new_data)?;
        let schema = rel.schema();
        let key_columns = rel.key_columns();
        let indexed_columns = rel.indexed_columns();

        loop {
            let mut guard = self.pool.fetch_page_mut(otid.page_id).await?;
            let (header, old_values) = {
                let page = HeapPage::new(guard.data());
                let (header, data) = page.tuple(otid.slot_id)?.ok_or(HeapError::TupleNotFound(otid))?;
                (header, Record::deserialize(data, &schema)?.values)
            };
            let changed = |col: &usize| !old_values[*col].binary_eq(&values[*col]);
            let lock_mode = if key_columns.iter().any(changed) {
                LockTupleMode::Exclusive
            } else {
                LockTupleMode::NoKeyExclusive
            };

            let (check, hints) = visibility::satisfies_update(&header, txid, cid, &self.tx_manager);
            let blocked = Self::blocked(&header, otid, check).or_else(|| {
                self.check_modifiable(rel, otid, &header, txid, lock_mode, crosscheck)
            });
            match blocked {
                Some(Blocked::Refused(refusal)) => {
                    debug!(table = %rel.name, tid = %otid, xid = %txid, outcome = ?refusal.outcome, "heap update refused");
                    return Ok(update_refused(refusal, lock_mode));
                }
                Some(Blocked::WaitFor(xid)) => {
                    drop(guard);
                    if let Some(refusal) = self.wait_or_block(rel, otid, xid, wait).await {
                        return Ok(update_refused(refusal, lock_mode));
                    }
                    continue;
                }
                None => {}
            }

            let mut old = header;
            old.infomask = old.infomask.merge(hints).reset_xmax();
            old.xmax = txid;
            old.cmax = cid;
            if lock_mode == LockTupleMode::Exclusive {
                old.infomask = old.infomask.with(Infomask::KEYS_UPDATED);
            }

            let mut new_header = TupleHeader::new_insert(txid, cid);
            new_header.infomask = new_header.infomask.with(Infomask::UPDATED);

            let hot_eligible = !indexed_columns.iter().any(changed);
            let mut page = HeapPage::new(guard.data_mut());
            if hot_eligible && page.can_insert(new_data.len()) {
                new_header.infomask = new_header.infomask.with(Infomask::HEAP_ONLY);
                let slot = page.insert_tuple(otid.page_id, new_header, &new_data)?;
                let new_tid = TupleId::new(otid.page_id, slot);
                old.infomask = old.infomask.with(Infomask::HOT_UPDATED);
                old.ctid = new_tid;
                page.update_header(otid.slot_id, &old)?;
                guard.mark_dirty();
                debug!(table = %rel.name, tid = %otid, %new_tid, xid = %txid, "heap-only update");
                return Ok(UpdateResult {
                    outcome: LockOutcome::Acquired,
                    failure: None,
                    lock_mode,
                    new_tid: Some(new_tid),
                    hot: true,
                });
            }

            // Fence the row with a lock-only xmax while the new version is
            // placed on another page.
            let mut fence = old;
            fence.infomask = fence.infomask.with(Infomask::XMAX_LOCK_ONLY);
            fence.ctid = otid;
            page.update_header(otid.slot_id, &fence)?;
            guard.mark_dirty();
            drop(guard);

            let new_tid = self.place_tuple(rel, new_header, &new_data).await?;

            let mut guard = self.pool.fetch_page_mut(otid.page_id).await?;
            let mut page = HeapPage::new(guard.data_mut());
            let mut current = page
                .get_header(otid.slot_id)?
                .ok_or(HeapError::TupleNotFound(otid))?;
            current.infomask = current
                .infomask
                .without(Infomask::XMAX_LOCK_ONLY)
                .merge(old.infomask);
            current.xmax = txid;
            current.cmax = cid;
            current.ctid = new_tid;
            page.update_header(otid.slot_id, &current)?;
            guard.mark_dirty();
            debug!(table = %rel.name, tid = %otid, %new_tid, xid = %txid, "heap update");
            return Ok(UpdateResult {
                outcome: LockOutcome::Acquired,
                failure: None,
                lock_mode,
                new_tid: Some(new_tid),
                hot: false,
            });
        }
    }

    /// Marks the version at `tid` deleted by `txid`.
    pub async fn delete_row(
        &self,
        rel: &Relation,
        tid: TupleId,
        txid: TxId,
        cid: CommandId,
        crosscheck: Option<&Snapshot>,
        wait: bool,
    ) -> Result<DeleteResult, HeapError> {
        loop {
            let mut guard = self.pool.fetch_page_mut(tid.page_id).await?;
            let header = HeapPage::new(guard.data())
                .get_header(tid.slot_id)?
                .ok_or(HeapError::TupleNotFound(tid))?;

            let (check, hints) = visibility::satisfies_update(&header, txid, cid, &self.tx_manager);
            let blocked = Self::blocked(&header, tid, check).or_else(|| {
                self.check_modifiable(rel, tid, &header, txid, LockTupleMode::Exclusive, crosscheck)
            });
            match blocked {
                Some(Blocked::Refused(refusal)) => {
                    debug!(table = %rel.name, %tid, xid = %txid, outcome = ?refusal.outcome, "heap delete refused");
                    return Ok(DeleteResult {
                        outcome: refusal.outcome,
                        failure: Some(refusal.failure),
                    });
                }
                Some(Blocked::WaitFor(xid)) => {
                    drop(guard);
                    if let Some(refusal) = self.wait_or_block(rel, tid, xid, wait).await {
                        return Ok(DeleteResult {
                            outcome: refusal.outcome,
                            failure: Some(refusal.failure),
                        });
                    }
                    continue;
                }
                None => {}
            }

            let mut deleted = header;
            deleted.infomask = deleted
                .infomask
                .merge(hints)
                .reset_xmax()
                .with(Infomask::KEYS_UPDATED);
            deleted.xmax = txid;
            deleted.cmax = cid;
            deleted.ctid = tid;
            HeapPage::new(guard.data_mut()).update_header(tid.slot_id, &deleted)?;
            guard.mark_dirty();
            debug!(table = %rel.name, %tid, xid = %txid, "heap delete");
            return Ok(DeleteResult {
                outcome: LockOutcome::Acquired,
                failure: None,
            });
        }
    }

    /// Takes a row lock of `mode` on the version at `tid` without changing
    /// the row.
    #[allow(clippy::too_many_arguments)]
    pub async fn lock_row(
        &self,
        rel: &Relation,
        tid: TupleId,
        txid: TxId,
        cid: CommandId,
        mode: LockTupleMode,
        wait_policy: LockWaitPolicy,
    ) -> Result<HeapLockResult, HeapError> {
        loop {
            let blocker = {
                // A shared latch is enough: writers check the lock table under
                // an exclusive latch, so they cannot slip in between.
                let guard = self.pool.fetch_page(tid.page_id).await?;
                let page = HeapPage::new(guard.data());
                let (header, data) = page.tuple(tid.slot_id)?.ok_or(HeapError::TupleNotFound(tid))?;
                let (check, _) = visibility::satisfies_update(&header, txid, cid, &self.tx_manager);
                let blocked = match Self::blocked(&header, tid, check) {
                    Some(blocked) => blocked,
                    None => match self
                        .row_locks
                        .try_acquire(rel.id, tid, txid, mode, &self.tx_manager)
                    {
                        Ok(()) => {
                            debug!(table = %rel.name, %tid, xid = %txid, %mode, "row locked");
                            return Ok(HeapLockResult {
                                outcome: LockOutcome::Acquired,
                                tuple: Some(HeapTuple::from_page(tid, rel.id, header, data)),
                                failure: None,
                            });
                        }
                        Err(holder) => Blocked::WaitFor(holder),
                    },
                };
                match blocked {
                    Blocked::Refused(refusal) => {
                        debug!(table = %rel.name, %tid, xid = %txid, outcome = ?refusal.outcome, "row lock refused");
                        return Ok(HeapLockResult {
                            outcome: refusal.outcome,
                            tuple: None,
                            failure: Some(refusal.failure),
                        });
                    }
                    Blocked::WaitFor(xid) => xid,
                }
            };

            match wait_policy {
                LockWaitPolicy::Block => {
                    debug!(table = %rel.name, %tid, xid = %blocker, "waiting for row lock");
                    self.tx_manager.wait_for(blocker).await;
                }
                LockWaitPolicy::Skip => {
                    return Ok(HeapLockResult {
                        outcome: LockOutcome::WouldBlock,
                        tuple: None,
                        failure: Some(UpdateFailure {
                            ctid: tid,
                            xmax: blocker,
                            cmax: None,
                        }),
                    });
                }
                LockWaitPolicy::Error => {
                    return Err(HeapError::LockNotAvailable { table: rel.id, tid });
                }
            }
        }
    }
}

fn update_refused(refusal: Refusal, lock_mode: LockTupleMode) -> UpdateResult {
    UpdateResult {
        outcome: refusal.outcome,
        failure: Some(refusal.failure),
        lock_mode,
        new_tid: None,
        hot: false,
    }
}
