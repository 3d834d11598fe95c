//! The heap access method: tuple placement, fetch and insert.
//!
//! Modification and locking live in [`modify`](super::modify), scans in
//! [`scan`](super::scan), and the routing-table glue in
//! [`handler`](super::handler).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::error::HeapError;
use super::page::{HeapPage, MAX_TUPLE_SIZE};
use super::record::Record;
use super::row_lock::RowLockTable;
use super::tuple::HeapTuple;
use super::tuple_header::{Infomask, TUPLE_HEADER_SIZE, TupleHeader};
use super::visibility;
use crate::catalog::Relation;
use crate::datum::Value;
use crate::storage::{BufferPool, PagePin, PageId, PageWriteGuard, Storage};
use crate::tableam::{TableId, TupleId};
use crate::tx::{CommandId, Snapshot, TransactionManager, TxId};

/// Where new tuples of a relation go.
#[derive(Debug, Clone, Copy)]
struct RelationPages {
    /// Page tried first by inserts.
    target: PageId,
    /// Last page of the chain.
    tail: PageId,
}

/// The heap storage engine.
///
/// Every relation is a chain of slotted pages starting at
/// [`Relation::first_page`]. Tuples are appended to the relation's current
/// target page; when it is full, a new page is linked to the end of the
/// chain.
pub struct HeapAm<S: Storage> {
    pub(super) pool: Arc<BufferPool<S>>,
    pub(super) tx_manager: Arc<TransactionManager>,
    pub(super) row_locks: RowLockTable,
    pages: Mutex<HashMap<TableId, RelationPages>>,
    extend_lock: tokio::sync::Mutex<()>,
}

impl<S: Storage> HeapAm<S> {
    /// Name under which the heap registers itself.
    pub const NAME: &'static str = "heap";

    /// Creates a heap engine over a buffer pool and transaction manager.
    pub fn new(pool: Arc<BufferPool<S>>, tx_manager: Arc<TransactionManager>) -> Self {
        Self {
            pool,
            tx_manager,
            row_locks: RowLockTable::new(),
            pages: Mutex::new(HashMap::new()),
            extend_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The engine's row-lock table.
    pub fn row_locks(&self) -> &RowLockTable {
        &self.row_locks
    }

    /// Allocates and initializes the first page of a new relation.
    pub async fn create_relation_storage(&self, table_id: TableId) -> Result<PageId, HeapError> {
        let mut guard = self.pool.new_page().await?;
        let page_id = guard.page_id();
        HeapPage::new(guard.data_mut()).init();
        guard.mark_dirty();
        self.pages.lock().insert(
            table_id,
            RelationPages {
                target: page_id,
                tail: page_id,
            },
        );
        debug!(table = %table_id, page = %page_id, "created heap storage");
        Ok(page_id)
    }

    /// Writes every dirty page to storage and syncs it.
    pub async fn sync(&self) -> Result<(), HeapError> {
        self.pool.flush_all().await?;
        Ok(())
    }

    async fn relation_pages(&self, rel: &Relation) -> Result<RelationPages, HeapError> {
        if let Some(pages) = self.pages.lock().get(&rel.id).copied() {
            return Ok(pages);
        }
        // Not cached yet: walk the chain to find its end.
        let mut tail = rel.first_page;
        loop {
            let guard = self.pool.fetch_page(tail).await?;
            match HeapPage::new(guard.data()).next_page() {
                Some(next) => tail = next,
                None => break,
            }
        }
        let pages = RelationPages { target: tail, tail };
        self.pages.lock().entry(rel.id).or_insert(pages);
        Ok(pages)
    }

    /// Links a fresh page to the end of the relation's chain and returns it
    /// latched for writing.
    async fn extend(&self, rel: &Relation) -> Result<PageWriteGuard, HeapError> {
        let _extending = self.extend_lock.lock().await;
        let tail = self.relation_pages(rel).await?.tail;

        let mut guard = self.pool.new_page().await?;
        let page_id = guard.page_id();
        HeapPage::new(guard.data_mut()).init();

        {
            let mut tail_guard = self.pool.fetch_page_mut(tail).await?;
            HeapPage::new(tail_guard.data_mut()).set_next_page(Some(page_id));
            tail_guard.mark_dirty();
        }

        self.pages.lock().insert(
            rel.id,
            RelationPages {
                target: page_id,
                tail: page_id,
            },
        );
        debug!(table = %rel.name, page = %page_id, "extended heap");
        Ok(guard)
    }

    /// Latches the relation's target page for writing.
    async fn target_page(&self, rel: &Relation) -> Result<PageWriteGuard, HeapError> {
        let target = self.relation_pages(rel).await?.target;
        Ok(self.pool.fetch_page_mut(target).await?)
    }

    /// Stores a tuple on the target page, extending the relation when it is
    /// full.
    pub(super) async fn place_tuple(
        &self,
        rel: &Relation,
        header: TupleHeader,
        data: &[u8],
    ) -> Result<TupleId, HeapError> {
        check_tuple_size(data)?;
        let mut guard = self.target_page(rel).await?;
        if !HeapPage::new(guard.data()).can_insert(data.len()) {
            drop(guard);
            guard = self.extend(rel).await?;
        }
        let page_id = guard.page_id();
        let slot = HeapPage::new(guard.data_mut()).insert_tuple(page_id, header, data)?;
        guard.mark_dirty();
        Ok(TupleId::new(page_id, slot))
    }

    /// Inserts one row and returns its TID.
    ///
    /// With a speculative token the tuple is left pending until
    /// [`finish_speculative_insert`](Self::finish_speculative_insert) or
    /// [`abort_speculative_insert`](Self::abort_speculative_insert).
    pub async fn insert_row(
        &self,
        rel: &Relation,
        values: &[Value],
        txid: TxId,
        cid: CommandId,
        speculative_token: Option<u32>,
    ) -> Result<TupleId, HeapError> {
        let data = form_record(rel, values)?;
        let mut header = TupleHeader::new_insert(txid, cid);
        if let Some(token) = speculative_token {
            header.set_speculative(token);
        }
        let tid = self.place_tuple(rel, header, &data).await?;
        debug!(table = %rel.name, %tid, xid = %txid, speculative = speculative_token.is_some(), "heap insert");
        Ok(tid)
    }

    /// Inserts many rows, keeping the current target page latched while
    /// rows fit on it.
    pub async fn insert_rows(
        &self,
        rel: &Relation,
        rows: &[Vec<Value>],
        txid: TxId,
        cid: CommandId,
        speculative_token: Option<u32>,
    ) -> Result<Vec<TupleId>, HeapError> {
        if speculative_token.is_some() {
            return Err(HeapError::SpeculativeMultiInsert);
        }
        let encoded = rows
            .iter()
            .map(|values| {
                let data = form_record(rel, values)?;
                check_tuple_size(&data)?;
                Ok(data)
            })
            .collect::<Result<Vec<_>, HeapError>>()?;

        let header = TupleHeader::new_insert(txid, cid);
        let mut tids = Vec::with_capacity(encoded.len());
        let mut current: Option<PageWriteGuard> = None;
        for data in &encoded {
            let mut guard = match current.take() {
                Some(guard) => guard,
                None => self.target_page(rel).await?,
            };
            if !HeapPage::new(guard.data()).can_insert(data.len()) {
                drop(guard);
                guard = self.extend(rel).await?;
            }
            let page_id = guard.page_id();
            let slot = HeapPage::new(guard.data_mut()).insert_tuple(page_id, header, data)?;
            guard.mark_dirty();
            tids.push(TupleId::new(page_id, slot));
            current = Some(guard);
        }
        debug!(table = %rel.name, rows = tids.len(), xid = %txid, "heap multi-insert");
        Ok(tids)
    }

    /// Confirms a speculative insertion, making it an ordinary tuple.
    pub async fn finish_speculative_insert(
        &self,
        tid: TupleId,
        token: u32,
    ) -> Result<(), HeapError> {
        let mut guard = self.pool.fetch_page_mut(tid.page_id).await?;
        let mut page = HeapPage::new(guard.data_mut());
        let mut header = page
            .get_header(tid.slot_id)?
            .ok_or(HeapError::TupleNotFound(tid))?;
        if header.speculative_token() != Some(token) {
            return Err(HeapError::NotSpeculative(tid));
        }
        header.infomask = header.infomask.without(Infomask::SPECULATIVE);
        header.ctid = tid;
        page.update_header(tid.slot_id, &header)?;
        guard.mark_dirty();
        Ok(())
    }

    /// Kills a speculative insertion so that no snapshot ever sees it.
    pub async fn abort_speculative_insert(&self, tid: TupleId) -> Result<(), HeapError> {
        let mut guard = self.pool.fetch_page_mut(tid.page_id).await?;
        let mut page = HeapPage::new(guard.data_mut());
        let mut header = page
            .get_header(tid.slot_id)?
            .ok_or(HeapError::TupleNotFound(tid))?;
        if header.speculative_token().is_none() {
            return Err(HeapError::NotSpeculative(tid));
        }
        header.xmin = TxId::INVALID;
        header.infomask = header
            .infomask
            .without(Infomask::SPECULATIVE | Infomask::XMIN_COMMITTED)
            .with(Infomask::XMIN_INVALID);
        header.ctid = tid;
        page.update_header(tid.slot_id, &header)?;
        guard.mark_dirty();
        debug!(%tid, "speculative insert aborted");
        Ok(())
    }

    /// Returns the version at `tid` visible to `snapshot`, following the
    /// update chain when the slot's occupant is not visible.
    ///
    /// With `keep_pin`, the page holding the returned version stays pinned
    /// until the returned pin is dropped.
    pub async fn fetch_tuple(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
        keep_pin: bool,
    ) -> Result<(Option<HeapTuple>, Option<PagePin>), HeapError> {
        let mut current = tid;
        let mut prior_xmax: Option<TxId> = None;
        loop {
            let guard = self.pool.fetch_page(current.page_id).await?;
            let page = HeapPage::new(guard.data());
            let Some((header, data)) = page.tuple(current.slot_id)? else {
                return Ok((None, None));
            };
            if prior_xmax.is_some_and(|xmax| xmax != header.xmin) {
                return Ok((None, None));
            }
            let (check, _) = visibility::satisfies(&header, snapshot, &self.tx_manager);
            if check.visible {
                let tuple = HeapTuple::from_page(current, rel.id, header, data);
                let pin = keep_pin.then(|| guard.unlatch());
                return Ok((Some(tuple), pin));
            }
            match header.successor(current) {
                Some(next) => {
                    prior_xmax = Some(header.xmax);
                    current = next;
                }
                None => return Ok((None, None)),
            }
        }
    }

    /// Follows a heap-only chain within one page from the index-referenced
    /// root at `tid`, returning the first version visible to `snapshot`.
    pub async fn hot_search_tuple(
        &self,
        rel: &Relation,
        tid: TupleId,
        snapshot: &Snapshot,
    ) -> Result<Option<HeapTuple>, HeapError> {
        let guard = self.pool.fetch_page(tid.page_id).await?;
        let page = HeapPage::new(guard.data());
        let mut current = tid;
        let mut prior_xmax: Option<TxId> = None;
        loop {
            let Some((header, data)) = page.tuple(current.slot_id)? else {
                return Ok(None);
            };
            if prior_xmax.is_some_and(|xmax| xmax != header.xmin) {
                return Ok(None);
            }
            let (check, _) = visibility::satisfies(&header, snapshot, &self.tx_manager);
            if check.visible {
                return Ok(Some(HeapTuple::from_page(current, rel.id, header, data)));
            }
            match header.successor(current) {
                Some(next)
                    if header.infomask.contains(Infomask::HOT_UPDATED)
                        && next.page_id == tid.page_id =>
                {
                    prior_xmax = Some(header.xmax);
                    current = next;
                }
                _ => return Ok(None),
            }
        }
    }

    /// Follows the update chain from `tid` and returns the newest version
    /// visible to `snapshot`.
    pub async fn latest_tid(
        &self,
        tid: TupleId,
        snapshot: &Snapshot,
    ) -> Result<Option<TupleId>, HeapError> {
        let mut latest = None;
        let mut current = tid;
        let mut prior_xmax: Option<TxId> = None;
        loop {
            let guard = self.pool.fetch_page(current.page_id).await?;
            let page = HeapPage::new(guard.data());
            let Some(header) = page.get_header(current.slot_id)? else {
                break;
            };
            if prior_xmax.is_some_and(|xmax| xmax != header.xmin) {
                break;
            }
            let (check, _) = visibility::satisfies(&header, snapshot, &self.tx_manager);
            if check.visible {
                latest = Some(current);
            }
            match header.successor(current) {
                Some(next) => {
                    prior_xmax = Some(header.xmax);
                    current = next;
                }
                None => break,
            }
        }
        Ok(latest)
    }
}

/// Validates `values` against the relation's columns and serializes them.
pub(super) fn form_record(rel: &Relation, values: &[Value]) -> Result<Vec<u8>, HeapError> {
    if values.len() != rel.columns.len() {
        return Err(HeapError::ColumnCountMismatch {
            expected: rel.columns.len(),
            actual: values.len(),
        });
    }
    if let Some(column) = rel
        .columns
        .iter()
        .zip(values)
        .position(|(col, value)| !col.ty.accepts(value))
    {
        return Err(HeapError::TypeMismatch { column });
    }
    Ok(Record::new(values.to_vec()).to_bytes()?)
}

pub(super) fn check_tuple_size(data: &[u8]) -> Result<(), HeapError> {
    let size = TUPLE_HEADER_SIZE + data.len();
    if size > MAX_TUPLE_SIZE {
        return Err(HeapError::TupleTooLarge {
            size,
            max: MAX_TUPLE_SIZE,
        });
    }
    Ok(())
}
