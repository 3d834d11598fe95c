//! Sequential heap scans.
//!
//! A scan walks the relation's page chain one page at a time. Each page is
//! read in two passes:
//! 1. **Read pass**: under a shared latch, check every tuple against the
//!    snapshot, copy out the visible ones, and collect hint bits learned
//!    along the way.
//! 2. **Write-back pass**: if any hints were learned, take the exclusive
//!    latch briefly and merge them, skipping tuples whose header changed in
//!    between.
//!
//! Once every tuple on a page carries its hints, the second pass is skipped.

use std::collections::VecDeque;

use super::access::HeapAm;
use super::error::HeapError;
use super::page::HeapPage;
use super::tuple::HeapTuple;
use super::tuple_header::{Infomask, TupleHeader};
use super::visibility;
use crate::catalog::Relation;
use crate::datum::Type;
use crate::storage::{PageId, Storage};
use crate::tableam::{ScanKey, SlotId, TableId, TupleId};
use crate::tx::Snapshot;

/// State of one sequential scan.
#[derive(Debug)]
pub struct HeapScan {
    table_id: TableId,
    schema: Vec<Type>,
    first_page: PageId,
    snapshot: Snapshot,
    keys: Vec<ScanKey>,
    /// Pages of the chain to skip before returning tuples.
    start_page: u64,
    /// Pages to scan after the skipped ones; `None` scans to the end.
    num_pages: Option<u64>,
    next_page: Option<PageId>,
    pages_seen: u64,
    buffered: VecDeque<HeapTuple>,
}

impl HeapScan {
    /// Creates a scan positioned before the first page.
    pub fn new(rel: &Relation, snapshot: Snapshot, keys: Vec<ScanKey>) -> Self {
        Self {
            table_id: rel.id,
            schema: rel.schema(),
            first_page: rel.first_page,
            snapshot,
            keys,
            start_page: 0,
            num_pages: None,
            next_page: Some(rel.first_page),
            pages_seen: 0,
            buffered: VecDeque::new(),
        }
    }

    /// The relation being scanned.
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Column types of the relation being scanned.
    pub fn schema(&self) -> &[Type] {
        &self.schema
    }

    /// The scan's snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Restarts from the beginning, optionally with new keys.
    pub fn rescan(&mut self, keys: Option<Vec<ScanKey>>) {
        if let Some(keys) = keys {
            self.keys = keys;
        }
        self.next_page = Some(self.first_page);
        self.pages_seen = 0;
        self.buffered.clear();
    }

    /// Restricts the scan to `num_pages` pages starting at chain position
    /// `start_page`, and restarts it.
    pub fn set_limits(&mut self, start_page: u64, num_pages: Option<u64>) {
        self.start_page = start_page;
        self.num_pages = num_pages;
        self.rescan(None);
    }

    /// Replaces the snapshot; tuples already buffered are kept.
    pub fn update_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    fn past_limit(&self) -> bool {
        self.num_pages
            .is_some_and(|n| self.pages_seen >= self.start_page.saturating_add(n))
    }

    fn matches(&self, tuple: &HeapTuple) -> Result<bool, HeapError> {
        if self.keys.is_empty() {
            return Ok(true);
        }
        let values = tuple.values(&self.schema)?;
        Ok(self.keys.iter().all(|key| key.matches(&values)))
    }
}

impl<S: Storage> HeapAm<S> {
    /// Returns the next tuple of the scan, or `None` at the end.
    pub async fn scan_next(&self, scan: &mut HeapScan) -> Result<Option<HeapTuple>, HeapError> {
        loop {
            if let Some(tuple) = scan.buffered.pop_front() {
                return Ok(Some(tuple));
            }
            if scan.past_limit() {
                return Ok(None);
            }
            let Some(page_id) = scan.next_page else {
                return Ok(None);
            };
            let position = scan.pages_seen;
            scan.pages_seen += 1;
            if position < scan.start_page {
                let guard = self.pool.fetch_page(page_id).await?;
                scan.next_page = HeapPage::new(guard.data()).next_page();
                continue;
            }
            let (tuples, next) = self.scan_page(scan, page_id).await?;
            scan.next_page = next;
            for tuple in tuples {
                if scan.matches(&tuple)? {
                    scan.buffered.push_back(tuple);
                }
            }
        }
    }

    async fn scan_page(
        &self,
        scan: &HeapScan,
        page_id: PageId,
    ) -> Result<(Vec<HeapTuple>, Option<PageId>), HeapError> {
        // Read pass
        let (tuples, next_page, hint_updates) = {
            let guard = self.pool.fetch_page(page_id).await?;
            let page = HeapPage::new(guard.data());

            let mut tuples = Vec::new();
            let mut hint_updates: Vec<(SlotId, TupleHeader, Infomask)> = Vec::new();
            for entry in page.tuples() {
                let (slot_id, header, data) = entry?;
                let (check, hints) = visibility::satisfies(&header, &scan.snapshot, &self.tx_manager);
                if hints != Infomask::empty() {
                    hint_updates.push((slot_id, header, hints));
                }
                if check.visible {
                    let tid = TupleId::new(page_id, slot_id);
                    tuples.push(HeapTuple::from_page(tid, scan.table_id, header, data));
                }
            }
            (tuples, page.next_page(), hint_updates)
        };

        // Write-back pass
        if !hint_updates.is_empty() {
            let mut guard = self.pool.fetch_page_mut(page_id).await?;
            let mut page = HeapPage::new(guard.data_mut());
            let mut changed = false;
            for (slot_id, observed, hints) in hint_updates {
                let Some(mut current) = page.get_header(slot_id)? else {
                    continue;
                };
                let hints = visibility::applicable_hints(&observed, &current, hints);
                let merged = current.infomask.merge(hints);
                if merged != current.infomask {
                    current.infomask = merged;
                    page.update_header(slot_id, &current)?;
                    changed = true;
                }
            }
            if changed {
                guard.mark_dirty();
            }
        }

        Ok((tuples, next_page))
    }
}
