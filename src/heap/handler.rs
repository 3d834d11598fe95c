//! The heap's entries in the access method routing table.

use async_trait::async_trait;
use bytes::Bytes;

use super::access::HeapAm;
use super::error::HeapError;
use super::scan::HeapScan;
use super::tuple::HeapTuple;
use super::visibility;
use crate::catalog::Relation;
use crate::storage::{PageId, Storage};
use crate::tableam::{
    AmError, BufferPin, DeleteResult, FetchResult, IndexInserter, InsertOptions, LockResult, LockTupleMode,
    LockWaitPolicy, ScanKey, SnapshotCheck, TableAccessMethod, TableId, TableScan, TableTuple, TupleField,
    TupleFieldValue, TupleId, TupleSlot, UpdateCheck, UpdateResult, VacuumVerdict,
};
use crate::tx::{CommandId, Snapshot, TxId};

fn heap_tuple(tuple: &TableTuple) -> Result<&HeapTuple, HeapError> {
    tuple.downcast_ref::<HeapTuple>().ok_or(HeapError::WrongTupleType)
}

fn heap_scan(scan: &mut TableScan) -> Result<&mut HeapScan, HeapError> {
    scan.downcast_mut::<HeapScan>().ok_or(HeapError::WrongScanType)
}

impl<S: Storage + 'static> HeapAm<S> {
    async fn index_new_row(
        &self,
        rel: &Relation,
        slot: &mut TupleSlot,
        tid: TupleId,
        token: Option<u32>,
        indexer: Option<&dyn IndexInserter>,
    ) -> Result<(), AmError> {
        match (token, indexer) {
            (Some(token), Some(indexer)) => {
                let conflict = indexer
                    .insert_index_entries(rel, tid, slot.values(), true)
                    .await?;
                if conflict {
                    self.abort_speculative_insert(tid).await?;
                    slot.speculative_conflict = true;
                } else {
                    self.finish_speculative_insert(tid, token).await?;
                }
            }
            // The caller runs the index phase and completes the insert itself.
            (Some(_), None) => {}
            (None, Some(indexer)) => {
                indexer
                    .insert_index_entries(rel, tid, slot.values(), false)
                    .await?;
            }
            (None, None) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Storage + 'static> TableAccessMethod for HeapAm<S> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn satisfies_snapshot(&self, tuple: &TableTuple, snapshot: &Snapshot) -> Result<SnapshotCheck, AmError> {
        let tuple = heap_tuple(tuple)?;
        Ok(visibility::satisfies(&tuple.header, snapshot, &self.tx_manager).0)
    }

    fn satisfies_update(&self, tuple: &TableTuple, txid: TxId, cid: CommandId) -> Result<UpdateCheck, AmError> {
        let tuple = heap_tuple(tuple)?;
        Ok(visibility::satisfies_update(&tuple.header, txid, cid, &self.tx_manager).0)
    }

    fn satisfies_vacuum(&self, tuple: &TableTuple, oldest_xmin: TxId) -> Result<VacuumVerdict, AmError> {
        let tuple = heap_tuple(tuple)?;
        Ok(visibility::satisfies_vacuum(&tuple.header, oldest_xmin, &self.tx_manager).0)
    }

    async fn fetch(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
        keep_pin: bool,
    ) -> Result<FetchResult, AmError> {
        let (tuple, pin) = self.fetch_tuple(rel, tid, snapshot, keep_pin).await?;
        Ok(FetchResult {
            tuple: tuple.map(TableTuple::new),
            pin: pin.map(BufferPin::new),
        })
    }

    async fn insert(
        &self,
        rel: &Relation,
        slot: &mut TupleSlot,
        txid: TxId,
        cid: CommandId,
        options: InsertOptions,
        indexer: Option<&dyn IndexInserter>,
    ) -> Result<TupleId, AmError> {
        let token = options.speculative_token;
        slot.speculative_conflict = false;
        let tid = self.insert_row(rel, slot.values(), txid, cid, token).await?;
        slot.mark_stored(tid, rel.id);
        self.index_new_row(rel, slot, tid, token, indexer).await?;
        Ok(tid)
    }

    async fn multi_insert(
        &self,
        rel: &Relation,
        slots: &mut [TupleSlot],
        txid: TxId,
        cid: CommandId,
        options: InsertOptions,
        indexer: Option<&dyn IndexInserter>,
    ) -> Result<Vec<TupleId>, AmError> {
        let rows: Vec<_> = slots.iter().map(|s| s.values().to_vec()).collect();
        let tids = self
            .insert_rows(rel, &rows, txid, cid, options.speculative_token)
            .await?;
        for (slot, &tid) in slots.iter_mut().zip(&tids) {
            slot.mark_stored(tid, rel.id);
            self.index_new_row(rel, slot, tid, None, indexer).await?;
        }
        Ok(tids)
    }

    async fn finish_speculative(&self, _rel: &Relation, tid: TupleId, token: u32) -> Result<(), AmError> {
        Ok(self.finish_speculative_insert(tid, token).await?)
    }

    async fn abort_speculative(&self, _rel: &Relation, tid: TupleId) -> Result<(), AmError> {
        Ok(self.abort_speculative_insert(tid).await?)
    }

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
        let result = self
            .update_row(rel, otid, slot.values(), txid, cid, crosscheck, wait)
            .await?;
        if let Some(new_tid) = result.new_tid {
            slot.mark_stored(new_tid, rel.id);
        }
        Ok(result)
    }

    async fn delete(
        &self,
        rel: &Relation,
        tid: TupleId,
        txid: TxId,
        cid: CommandId,
        crosscheck: Option<&Snapshot>,
        wait: bool,
    ) -> Result<DeleteResult, AmError> {
        Ok(self.delete_row(rel, tid, txid, cid, crosscheck, wait).await?)
    }

    async fn lock_tuple(
        &self,
        rel: &Relation,
        tid: TupleId,
        txid: TxId,
        cid: CommandId,
        mode: LockTupleMode,
        wait_policy: LockWaitPolicy,
    ) -> Result<LockResult, AmError> {
        let result = self.lock_row(rel, tid, txid, cid, mode, wait_policy).await?;
        Ok(LockResult {
            outcome: result.outcome,
            tuple: result.tuple.map(TableTuple::new),
            failure: result.failure,
        })
    }

    async fn get_latest_tid(
        &self,
        _rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
    ) -> Result<Option<TupleId>, AmError> {
        Ok(self.latest_tid(tid, snapshot).await?)
    }

    async fn hot_search(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
    ) -> Result<Option<TableTuple>, AmError> {
        let tuple = self.hot_search_tuple(rel, tid, snapshot).await?;
        Ok(tuple.map(TableTuple::new))
    }

    fn tuple_field(&self, tuple: &TableTuple, field: TupleField) -> Result<TupleFieldValue, AmError> {
        let tuple = heap_tuple(tuple)?;
        let value = match field {
            TupleField::CreatorXid => TupleFieldValue::Xid(tuple.header.xmin),
            TupleField::UpdaterXid => TupleFieldValue::Xid(tuple.header.xmax),
            TupleField::CreationCid => TupleFieldValue::Cid(tuple.header.cmin),
            TupleField::CurrentTid => TupleFieldValue::Tid(tuple.tid),
            TupleField::ChainTid => TupleFieldValue::Tid(tuple.header.ctid),
        };
        Ok(value)
    }

    fn tuple_from_datum(&self, datum: &Bytes, table_id: TableId) -> Result<TableTuple, AmError> {
        Ok(TableTuple::new(HeapTuple::from_datum(datum, table_id)?))
    }

    fn store_tuple(&self, rel: &Relation, tuple: &TableTuple, slot: &mut TupleSlot) -> Result<(), AmError> {
        let heap = heap_tuple(tuple)?;
        let values = heap.values(&rel.schema())?;
        slot.store(values, Some(tuple.clone()), heap.tid, heap.table_id);
        Ok(())
    }

    async fn create_storage(&self, table_id: TableId) -> Result<PageId, AmError> {
        Ok(self.create_relation_storage(table_id).await?)
    }

    async fn relation_sync(&self, _rel: &Relation) -> Result<(), AmError> {
        Ok(self.sync().await?)
    }

    async fn scan_begin(&self, rel: &Relation, snapshot: Snapshot, keys: Vec<ScanKey>) -> Result<TableScan, AmError> {
        Ok(TableScan::new(HeapScan::new(rel, snapshot, keys)))
    }

    async fn scan_getnext(&self, scan: &mut TableScan) -> Result<Option<TableTuple>, AmError> {
        let scan = heap_scan(scan)?;
        let tuple = self.scan_next(scan).await?;
        Ok(tuple.map(TableTuple::new))
    }

    async fn scan_getnext_slot(&self, scan: &mut TableScan, slot: &mut TupleSlot) -> Result<bool, AmError> {
        let scan = heap_scan(scan)?;
        match self.scan_next(scan).await? {
            Some(tuple) => {
                let values = tuple.values(scan.schema())?;
                let (tid, table_id) = (tuple.tid, tuple.table_id);
                slot.store(values, Some(TableTuple::new(tuple)), tid, table_id);
                Ok(true)
            }
            None => {
                slot.clear();
                Ok(false)
            }
        }
    }

    fn scan_end(&self, scan: TableScan) -> Result<(), AmError> {
        scan.into_inner::<HeapScan>().ok_or(HeapError::WrongScanType)?;
        Ok(())
    }

    fn scan_rescan(&self, scan: &mut TableScan, keys: Option<Vec<ScanKey>>) -> Result<(), AmError> {
        heap_scan(scan)?.rescan(keys);
        Ok(())
    }

    fn scan_set_limits(&self, scan: &mut TableScan, start_page: u64, num_pages: Option<u64>) -> Result<(), AmError> {
        heap_scan(scan)?.set_limits(start_page, num_pages);
        Ok(())
    }

    fn scan_update_snapshot(&self, scan: &mut TableScan, snapshot: Snapshot) -> Result<(), AmError> {
        heap_scan(scan)?.update_snapshot(snapshot);
        Ok(())
    }
}
