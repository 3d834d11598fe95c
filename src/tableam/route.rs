//! Generic entry points.
//!
//! Each function forwards to the relation's access method with its
//! arguments and result untouched.

use bytes::Bytes;

use super::error::AmError;
use super::method::{IndexInserter, TableAccessMethod};
use super::slot::TupleSlot;
use super::tuple::{FetchResult, LockResult, TableScan, TableTuple};
use super::types::{
    DeleteResult, InsertOptions, LockTupleMode, LockWaitPolicy, ScanKey, SnapshotCheck, TableId, TupleField,
    TupleFieldValue, TupleId, UpdateCheck, UpdateResult, VacuumVerdict,
};
use crate::catalog::Relation;
use crate::storage::PageId;
use crate::tx::{CommandId, Snapshot, TxId};

/// Checks whether `snapshot` sees the tuple.
pub fn table_satisfies_snapshot(
    rel: &Relation,
    tuple: &TableTuple,
    snapshot: &Snapshot,
) -> Result<SnapshotCheck, AmError> {
    rel.am().satisfies_snapshot(tuple, snapshot)
}

/// Decides whether `txid` at `cid` may modify the tuple.
pub fn table_satisfies_update(
    rel: &Relation,
    tuple: &TableTuple,
    txid: TxId,
    cid: CommandId,
) -> Result<UpdateCheck, AmError> {
    rel.am().satisfies_update(tuple, txid, cid)
}

/// Classifies the tuple for space reclamation against `oldest_xmin`.
pub fn table_satisfies_vacuum(
    rel: &Relation,
    tuple: &TableTuple,
    oldest_xmin: TxId,
) -> Result<VacuumVerdict, AmError> {
    rel.am().satisfies_vacuum(tuple, oldest_xmin)
}

/// Fetches the version at `tid` visible to `snapshot`, optionally keeping its page pinned.
pub async fn table_fetch(
    rel: &Relation,
    tid: TupleId,
    snapshot: &Snapshot,
    keep_pin: bool,
) -> Result<FetchResult, AmError> {
    rel.am().fetch(rel, tid, snapshot, keep_pin).await
}

/// Inserts the slot's row and runs the index phase through `indexer`.
pub async fn table_insert(
    rel: &Relation,
    slot: &mut TupleSlot,
    txid: TxId,
    cid: CommandId,
    options: InsertOptions,
    indexer: Option<&dyn IndexInserter>,
) -> Result<TupleId, AmError> {
    rel.am().insert(rel, slot, txid, cid, options, indexer).await
}

/// Inserts every slot's row in one call.
pub async fn table_multi_insert(
    rel: &Relation,
    slots: &mut [TupleSlot],
    txid: TxId,
    cid: CommandId,
    options: InsertOptions,
    indexer: Option<&dyn IndexInserter>,
) -> Result<Vec<TupleId>, AmError> {
    rel.am().multi_insert(rel, slots, txid, cid, options, indexer).await
}

/// Confirms a speculative insertion made with `token`.
pub async fn table_finish_speculative(rel: &Relation, tid: TupleId, token: u32) -> Result<(), AmError> {
    rel.am().finish_speculative(rel, tid, token).await
}

/// Makes a speculative insertion invisible to everyone.
pub async fn table_abort_speculative(rel: &Relation, tid: TupleId) -> Result<(), AmError> {
    rel.am().abort_speculative(rel, tid).await
}

/// Replaces the version at `otid` with the slot's row.
#[allow(clippy::too_many_arguments)]
pub async fn table_update(
    rel: &Relation,
    otid: TupleId,
    slot: &mut TupleSlot,
    txid: TxId,
    cid: CommandId,
    crosscheck: Option<&Snapshot>,
    wait: bool,
) -> Result<UpdateResult, AmError> {
    rel.am().update(rel, otid, slot, txid, cid, crosscheck, wait).await
}

/// Deletes the version at `tid`.
pub async fn table_delete(
    rel: &Relation,
    tid: TupleId,
    txid: TxId,
    cid: CommandId,
    crosscheck: Option<&Snapshot>,
    wait: bool,
) -> Result<DeleteResult, AmError> {
    rel.am().delete(rel, tid, txid, cid, crosscheck, wait).await
}

/// Locks the row at `tid` in `mode`, honoring `wait_policy`.
pub async fn table_lock_tuple(
    rel: &Relation,
    tid: TupleId,
    txid: TxId,
    cid: CommandId,
    mode: LockTupleMode,
    wait_policy: LockWaitPolicy,
) -> Result<LockResult, AmError> {
    rel.am().lock_tuple(rel, tid, txid, cid, mode, wait_policy).await
}

/// Newest version reachable from `tid` that `snapshot` sees.
pub async fn table_get_latest_tid(
    rel: &Relation,
    tid: TupleId,
    snapshot: &Snapshot,
) -> Result<Option<TupleId>, AmError> {
    rel.am().get_latest_tid(rel, tid, snapshot).await
}

/// First version of the heap-only chain rooted at `tid` that `snapshot` sees.
pub async fn table_hot_search(
    rel: &Relation,
    tid: TupleId,
    snapshot: &Snapshot,
) -> Result<Option<TableTuple>, AmError> {
    rel.am().hot_search(rel, tid, snapshot).await
}

/// Reads a metadata field of a tuple.
pub fn table_tuple_field(rel: &Relation, tuple: &TableTuple, field: TupleField) -> Result<TupleFieldValue, AmError> {
    rel.am().tuple_field(tuple, field)
}

/// Materializes a tuple of `rel` from an external datum.
pub fn table_tuple_from_datum(rel: &Relation, datum: &Bytes) -> Result<TableTuple, AmError> {
    rel.am().tuple_from_datum(datum, rel.id)
}

/// Deforms a tuple into `slot`.
pub fn table_store_tuple(rel: &Relation, tuple: &TableTuple, slot: &mut TupleSlot) -> Result<(), AmError> {
    rel.am().store_tuple(rel, tuple, slot)
}

/// Creates storage for a relation that does not exist yet, so it takes the
/// access method directly.
pub async fn table_create_storage(am: &dyn TableAccessMethod, table_id: TableId) -> Result<PageId, AmError> {
    am.create_storage(table_id).await
}

/// Makes the relation's changes durable.
pub async fn table_relation_sync(rel: &Relation) -> Result<(), AmError> {
    rel.am().relation_sync(rel).await
}

/// Starts a scan of `rel` filtered by equality `keys`.
pub async fn table_scan_begin(rel: &Relation, snapshot: Snapshot, keys: Vec<ScanKey>) -> Result<TableScan, AmError> {
    rel.am().scan_begin(rel, snapshot, keys).await
}

/// Next tuple of a scan, or `None` at the end.
pub async fn table_scan_getnext(rel: &Relation, scan: &mut TableScan) -> Result<Option<TableTuple>, AmError> {
    rel.am().scan_getnext(scan).await
}

/// Next tuple of a scan deformed into `slot`; false at the end.
pub async fn table_scan_getnext_slot(
    rel: &Relation,
    scan: &mut TableScan,
    slot: &mut TupleSlot,
) -> Result<bool, AmError> {
    rel.am().scan_getnext_slot(scan, slot).await
}

/// Ends a scan and releases its resources.
pub fn table_scan_end(rel: &Relation, scan: TableScan) -> Result<(), AmError> {
    rel.am().scan_end(scan)
}

/// Restarts a scan from the first page, optionally with new keys.
pub fn table_scan_rescan(rel: &Relation, scan: &mut TableScan, keys: Option<Vec<ScanKey>>) -> Result<(), AmError> {
    rel.am().scan_rescan(scan, keys)
}

/// Restricts a scan to `num_pages` pages starting at `start_page`.
pub fn table_scan_set_limits(
    rel: &Relation,
    scan: &mut TableScan,
    start_page: u64,
    num_pages: Option<u64>,
) -> Result<(), AmError> {
    rel.am().scan_set_limits(scan, start_page, num_pages)
}

/// Replaces the snapshot of a running scan.
pub fn table_scan_update_snapshot(rel: &Relation, scan: &mut TableScan, snapshot: Snapshot) -> Result<(), AmError> {
    rel.am().scan_update_snapshot(scan, snapshot)
}
