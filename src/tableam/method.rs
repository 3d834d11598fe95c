//! The routing table every storage engine implements.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::AmError;
use super::slot::TupleSlot;
use super::tuple::{FetchResult, LockResult, TableScan, TableTuple};
use super::types::{
    DeleteResult, InsertOptions, LockTupleMode, LockWaitPolicy, ScanKey, SnapshotCheck, TableId, TupleField,
    TupleFieldValue, TupleId, UpdateCheck, UpdateResult, VacuumVerdict,
};
use crate::catalog::Relation;
use crate::datum::Value;
use crate::storage::PageId;
use crate::tx::{CommandId, Snapshot, TxId};

/// Index maintenance callback handed to insert.
#[async_trait]
pub trait IndexInserter: Send + Sync {
    /// Adds index entries for the row stored at `tid`.
    ///
    /// With `speculative`, unique conflicts are reported by returning `true`
    /// instead of failing.
    async fn insert_index_entries(
        &self,
        rel: &Relation,
        tid: TupleId,
        values: &[Value],
        speculative: bool,
    ) -> Result<bool, AmError>;
}

fn unsupported<T>(engine: &'static str, operation: &'static str) -> Result<T, AmError> {
    Err(AmError::Unsupported { operation, engine })
}

/// Operations a storage engine provides for the relations it stores.
///
/// One implementation is resolved per relation and shared read-only. Every
/// operation has a default body that fails with [`AmError::Unsupported`], so
/// an engine only implements what it supports.
#[allow(unused_variables, clippy::too_many_arguments)]
#[async_trait]
pub trait TableAccessMethod: Send + Sync {
    /// Engine name, used in error messages.
    fn name(&self) -> &'static str;

    /// Checks a tuple against a snapshot.
    fn satisfies_snapshot(&self, tuple: &TableTuple, snapshot: &Snapshot) -> Result<SnapshotCheck, AmError> {
        unsupported(self.name(), "satisfies_snapshot")
    }

    /// Decides whether `txid` at `cid` may modify the tuple.
    fn satisfies_update(&self, tuple: &TableTuple, txid: TxId, cid: CommandId) -> Result<UpdateCheck, AmError> {
        unsupported(self.name(), "satisfies_update")
    }

    /// Classifies the tuple for space reclamation.
    fn satisfies_vacuum(&self, tuple: &TableTuple, oldest_xmin: TxId) -> Result<VacuumVerdict, AmError> {
        unsupported(self.name(), "satisfies_vacuum")
    }

    /// Fetches the version at `tid` visible to `snapshot`.
    async fn fetch(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
        keep_pin: bool,
    ) -> Result<FetchResult, AmError> {
        unsupported(self.name(), "fetch")
    }

    /// Inserts the slot's row and records its TID in the slot.
    async fn insert(
        &self,
        rel: &Relation,
        slot: &mut TupleSlot,
        txid: TxId,
        cid: CommandId,
        options: InsertOptions,
        indexer: Option<&dyn IndexInserter>,
    ) -> Result<TupleId, AmError> {
        unsupported(self.name(), "insert")
    }

    /// Inserts many rows.
    async fn multi_insert(
        &self,
        rel: &Relation,
        slots: &mut [TupleSlot],
        txid: TxId,
        cid: CommandId,
        options: InsertOptions,
        indexer: Option<&dyn IndexInserter>,
    ) -> Result<Vec<TupleId>, AmError> {
        unsupported(self.name(), "multi_insert")
    }

    /// Confirms a speculative insertion.
    async fn finish_speculative(&self, rel: &Relation, tid: TupleId, token: u32) -> Result<(), AmError> {
        unsupported(self.name(), "finish_speculative")
    }

    /// Kills a speculative insertion.
    async fn abort_speculative(&self, rel: &Relation, tid: TupleId) -> Result<(), AmError> {
        unsupported(self.name(), "abort_speculative")
    }

    /// Replaces the version at `otid` with the slot's row.
    async fn update(
        &self,
        rel: &Relation,
        otid: TupleId,
        slot: &mut TupleSlot,
        txid: TxId,
        cid: CommandId,
        crosscheck: Option<&Snapshot>,
        wait: bool,
    ) -> Result<UpdateResult, AmError> {
        unsupported(self.name(), "update")
    }

    /// Deletes the version at `tid`.
    async fn delete(
        &self,
        rel: &Relation,
        tid: TupleId,
        txid: TxId,
        cid: CommandId,
        crosscheck: Option<&Snapshot>,
        wait: bool,
    ) -> Result<DeleteResult, AmError> {
        unsupported(self.name(), "delete")
    }

    /// Locks the row at `tid`.
    async fn lock_tuple(
        &self,
        rel: &Relation,
        tid: TupleId,
        txid: TxId,
        cid: CommandId,
        mode: LockTupleMode,
        wait_policy: LockWaitPolicy,
    ) -> Result<LockResult, AmError> {
        unsupported(self.name(), "lock_tuple")
    }

    /// Newest version reachable from `tid` that `snapshot` sees.
    async fn get_latest_tid(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
    ) -> Result<Option<TupleId>, AmError> {
        unsupported(self.name(), "get_latest_tid")
    }

    /// First version of the index-referenced chain at `tid` that `snapshot`
    /// sees.
    async fn hot_search(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
    ) -> Result<Option<TableTuple>, AmError> {
        unsupported(self.name(), "hot_search")
    }

    /// Reads a metadata field of a tuple.
    fn tuple_field(&self, tuple: &TableTuple, field: TupleField) -> Result<TupleFieldValue, AmError> {
        unsupported(self.name(), "tuple_field")
    }

    /// Materializes a tuple received as an external datum.
    fn tuple_from_datum(&self, datum: &Bytes, table_id: TableId) -> Result<TableTuple, AmError> {
        unsupported(self.name(), "tuple_from_datum")
    }

    /// Deforms a tuple into a slot.
    fn store_tuple(&self, rel: &Relation, tuple: &TableTuple, slot: &mut TupleSlot) -> Result<(), AmError> {
        unsupported(self.name(), "store_tuple")
    }

    /// Creates the storage of a new relation and returns its first page.
    async fn create_storage(&self, table_id: TableId) -> Result<PageId, AmError> {
        unsupported(self.name(), "create_storage")
    }

    /// Makes the relation's changes durable.
    async fn relation_sync(&self, rel: &Relation) -> Result<(), AmError> {
        unsupported(self.name(), "relation_sync")
    }

    /// Starts a sequential scan.
    async fn scan_begin(&self, rel: &Relation, snapshot: Snapshot, keys: Vec<ScanKey>) -> Result<TableScan, AmError> {
        unsupported(self.name(), "scan_begin")
    }

    /// Next tuple of a scan.
    async fn scan_getnext(&self, scan: &mut TableScan) -> Result<Option<TableTuple>, AmError> {
        unsupported(self.name(), "scan_getnext")
    }

    /// Next tuple of a scan, deformed into `slot`. Returns false at the end.
    async fn scan_getnext_slot(&self, scan: &mut TableScan, slot: &mut TupleSlot) -> Result<bool, AmError> {
        unsupported(self.name(), "scan_getnext_slot")
    }

    /// Ends a scan.
    fn scan_end(&self, scan: TableScan) -> Result<(), AmError> {
        unsupported(self.name(), "scan_end")
    }

    /// Restarts a scan, optionally with new keys.
    fn scan_rescan(&self, scan: &mut TableScan, keys: Option<Vec<ScanKey>>) -> Result<(), AmError> {
        unsupported(self.name(), "scan_rescan")
    }

    /// Restricts a scan to a range of pages.
    fn scan_set_limits(&self, scan: &mut TableScan, start_page: u64, num_pages: Option<u64>) -> Result<(), AmError> {
        unsupported(self.name(), "scan_set_limits")
    }

    /// Replaces a scan's snapshot.
    fn scan_update_snapshot(&self, scan: &mut TableScan, snapshot: Snapshot) -> Result<(), AmError> {
        unsupported(self.name(), "scan_update_snapshot")
    }
}
