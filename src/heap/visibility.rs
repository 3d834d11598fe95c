//! Visibility predicates over heap tuple headers.
//!
//! Each predicate is a pure function of the header, the caller's snapshot or
//! transaction, and the transaction manager's current knowledge. None of
//! them write to the page: hint bits learned along the way are returned as
//! an [`Infomask`] for the caller to merge back under a write latch.

use super::tuple_header::{Infomask, TupleHeader};
use crate::tableam::{SnapshotCheck, UpdateCheck, VacuumVerdict};
use crate::tx::{CommandId, DirtySnapshot, MvccSnapshot, Snapshot, TransactionManager, TxId, TxState};

/// What the xmax field means right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Xmax {
    /// Unset, aborted, or a lock whose holder has finished.
    Unset,
    /// A row lock held by a running transaction.
    LockOnly(TxId),
    /// A delete or update.
    Modified(TxId, TxState),
}

fn xmin_state(header: &TupleHeader, tx_manager: &TransactionManager) -> (TxState, Infomask) {
    let mask = header.infomask;
    if header.xmin == TxId::FROZEN || mask.xmin_committed() {
        return (TxState::Committed, Infomask::empty());
    }
    if mask.xmin_invalid() || header.xmin.is_invalid() {
        return (TxState::Aborted, Infomask::empty());
    }
    match tx_manager.state(header.xmin) {
        TxState::Committed => (TxState::Committed, Infomask::empty().with(Infomask::XMIN_COMMITTED)),
        TxState::Aborted => (TxState::Aborted, Infomask::empty().with(Infomask::XMIN_INVALID)),
        TxState::InProgress => (TxState::InProgress, Infomask::empty()),
    }
}

fn xmax_state(header: &TupleHeader, tx_manager: &TransactionManager) -> (Xmax, Infomask) {
    let mask = header.infomask;
    if header.xmax.is_invalid() || mask.xmax_invalid() {
        return (Xmax::Unset, Infomask::empty());
    }
    if mask.xmax_lock_only() {
        return if tx_manager.is_in_progress(header.xmax) {
            (Xmax::LockOnly(header.xmax), Infomask::empty())
        } else {
            (Xmax::Unset, Infomask::empty().with(Infomask::XMAX_INVALID))
        };
    }
    if header.xmax == TxId::FROZEN || mask.xmax_committed() {
        return (Xmax::Modified(header.xmax, TxState::Committed), Infomask::empty());
    }
    match tx_manager.state(header.xmax) {
        TxState::Committed => (
            Xmax::Modified(header.xmax, TxState::Committed),
            Infomask::empty().with(Infomask::XMAX_COMMITTED),
        ),
        TxState::Aborted => (Xmax::Unset, Infomask::empty().with(Infomask::XMAX_INVALID)),
        TxState::InProgress => (Xmax::Modified(header.xmax, TxState::InProgress), Infomask::empty()),
    }
}

/// Plain MVCC visibility for reads.
pub fn satisfies_mvcc(
    header: &TupleHeader,
    snapshot: &MvccSnapshot,
    tx_manager: &TransactionManager,
) -> (bool, Infomask) {
    let mut hints = Infomask::empty();

    if header.xmin == snapshot.current_txid {
        if header.cmin >= snapshot.current_cid {
            return (false, hints);
        }
    } else {
        let (state, learned) = xmin_state(header, tx_manager);
        hints = hints.merge(learned);
        if state != TxState::Committed || !snapshot.is_txid_visible(header.xmin) {
            return (false, hints);
        }
    }

    let (xmax, learned) = xmax_state(header, tx_manager);
    hints = hints.merge(learned);
    let visible = match xmax {
        Xmax::Unset | Xmax::LockOnly(_) => true,
        Xmax::Modified(xid, _) if xid == snapshot.current_txid => header.cmax >= snapshot.current_cid,
        Xmax::Modified(_, TxState::Committed) => !snapshot.is_txid_visible(header.xmax),
        Xmax::Modified(..) => true,
    };
    (visible, hints)
}

/// Dirty visibility: committed and in-progress versions are visible, and
/// running writers are reported so the caller can wait for them.
pub fn satisfies_dirty(
    header: &TupleHeader,
    snapshot: &DirtySnapshot,
    tx_manager: &TransactionManager,
) -> (SnapshotCheck, Infomask) {
    let mut hints = Infomask::empty();
    let mut check = SnapshotCheck::INVISIBLE;

    if header.xmin != snapshot.current_txid {
        let (state, learned) = xmin_state(header, tx_manager);
        hints = hints.merge(learned);
        match state {
            TxState::Aborted => return (check, hints),
            TxState::InProgress => {
                check.visible = true;
                check.xmin_in_progress = Some(header.xmin);
                return (check, hints);
            }
            TxState::Committed => {}
        }
    }

    let (xmax, learned) = xmax_state(header, tx_manager);
    hints = hints.merge(learned);
    match xmax {
        Xmax::Unset | Xmax::LockOnly(_) => check.visible = true,
        Xmax::Modified(xid, _) if xid == snapshot.current_txid => {}
        Xmax::Modified(xid, TxState::InProgress) => {
            check.visible = true;
            check.xmax_in_progress = Some(xid);
        }
        Xmax::Modified(..) => {}
    }
    (check, hints)
}

/// Checks a header against any kind of snapshot.
pub fn satisfies(
    header: &TupleHeader,
    snapshot: &Snapshot,
    tx_manager: &TransactionManager,
) -> (SnapshotCheck, Infomask) {
    match snapshot {
        Snapshot::Mvcc(s) => {
            let (visible, hints) = satisfies_mvcc(header, s, tx_manager);
            let check = if visible {
                SnapshotCheck::VISIBLE
            } else {
                SnapshotCheck::INVISIBLE
            };
            (check, hints)
        }
        Snapshot::Dirty(s) => satisfies_dirty(header, s, tx_manager),
        Snapshot::Any => (SnapshotCheck::VISIBLE, Infomask::empty()),
    }
}

/// Decides whether transaction `txid` at command `cid` may modify or lock
/// the version.
pub fn satisfies_update(
    header: &TupleHeader,
    txid: TxId,
    cid: CommandId,
    tx_manager: &TransactionManager,
) -> (UpdateCheck, Infomask) {
    let mut hints = Infomask::empty();

    if header.xmin == txid {
        if header.cmin >= cid {
            return (UpdateCheck::Invisible, hints);
        }
    } else {
        let (state, learned) = xmin_state(header, tx_manager);
        hints = hints.merge(learned);
        if state != TxState::Committed {
            return (UpdateCheck::Invisible, hints);
        }
    }

    let (xmax, learned) = xmax_state(header, tx_manager);
    hints = hints.merge(learned);
    let check = match xmax {
        Xmax::Unset => UpdateCheck::MayBeUpdated,
        Xmax::LockOnly(locker) if locker == txid => UpdateCheck::MayBeUpdated,
        Xmax::LockOnly(locker) => UpdateCheck::BeingUpdated(locker),
        Xmax::Modified(xid, _) if xid == txid => {
            if header.cmax >= cid {
                UpdateCheck::SelfUpdated { cmax: header.cmax }
            } else {
                UpdateCheck::Invisible
            }
        }
        Xmax::Modified(xid, TxState::InProgress) => UpdateCheck::BeingUpdated(xid),
        Xmax::Modified(..) => UpdateCheck::Updated,
    };
    (check, hints)
}

/// Classifies a version for space reclamation against `oldest_xmin`.
pub fn satisfies_vacuum(
    header: &TupleHeader,
    oldest_xmin: TxId,
    tx_manager: &TransactionManager,
) -> (VacuumVerdict, Infomask) {
    let (xmin, mut hints) = xmin_state(header, tx_manager);
    let (xmax, learned) = xmax_state(header, tx_manager);
    hints = hints.merge(learned);

    let verdict = match (xmin, xmax) {
        (TxState::Aborted, _) => VacuumVerdict::Dead,
        (TxState::InProgress, Xmax::Unset | Xmax::LockOnly(_)) => VacuumVerdict::InsertInProgress,
        (TxState::InProgress, Xmax::Modified(..)) => VacuumVerdict::DeleteInProgress,
        (TxState::Committed, Xmax::Unset | Xmax::LockOnly(_)) => VacuumVerdict::Live,
        (TxState::Committed, Xmax::Modified(_, TxState::InProgress)) => VacuumVerdict::DeleteInProgress,
        (TxState::Committed, Xmax::Modified(xid, _)) if xid < oldest_xmin => VacuumVerdict::Dead,
        (TxState::Committed, Xmax::Modified(..)) => VacuumVerdict::RecentlyDead,
    };
    (verdict, hints)
}

/// Hint bits that are still accurate for `current`, given that they were
/// learned from `observed`.
///
/// Xmax hints are dropped if the xmax changed in between, so a stale
/// "aborted" hint never lands on a fresh deleter.
pub fn applicable_hints(observed: &TupleHeader, current: &TupleHeader, hints: Infomask) -> Infomask {
    const XMIN_BITS: u16 = Infomask::XMIN_COMMITTED | Infomask::XMIN_INVALID;
    const XMAX_BITS: u16 = Infomask::XMAX_COMMITTED | Infomask::XMAX_INVALID;

    let mut keep = hints;
    if observed.xmin != current.xmin {
        keep = keep.without(XMIN_BITS);
    }
    if observed.xmax != current.xmax || observed.infomask.xmax_lock_only() != current.infomask.xmax_lock_only() {
        keep = keep.without(XMAX_BITS);
    }
    keep
}
