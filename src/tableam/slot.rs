//! Engine-independent row container.

use super::tuple::TableTuple;
use super::types::{TableId, TupleId};
use crate::datum::Value;

/// Column values passed across the access method boundary.
///
/// A slot may also wrap the physical tuple its values came from. Changing
/// the values drops that tuple, since it no longer matches.
#[derive(Debug, Clone, Default)]
pub struct TupleSlot {
    values: Vec<Value>,
    tuple: Option<TableTuple>,
    /// Where the row is stored, once stored or fetched.
    pub tid: Option<TupleId>,
    /// Owning relation, once stored or fetched.
    pub table_id: Option<TableId>,
    /// Set by a speculative insert that hit a unique conflict.
    pub speculative_conflict: bool,
}

impl TupleSlot {
    /// Creates a slot holding `values`.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Column values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Mutable column values. Drops any wrapped tuple.
    pub fn values_mut(&mut self) -> &mut Vec<Value> {
        self.tuple = None;
        &mut self.values
    }

    /// Value of column `column`.
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    /// Replaces the values. Drops any wrapped tuple.
    pub fn set_values(&mut self, values: Vec<Value>) {
        self.tuple = None;
        self.values = values;
    }

    /// Consumes the slot, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// The wrapped physical tuple, if any.
    pub fn tuple(&self) -> Option<&TableTuple> {
        self.tuple.as_ref()
    }

    /// Materializes a stored row into the slot.
    pub fn store(&mut self, values: Vec<Value>, tuple: Option<TableTuple>, tid: TupleId, table_id: TableId) {
        self.values = values;
        self.tuple = tuple;
        self.tid = Some(tid);
        self.table_id = Some(table_id);
    }

    /// Records where the slot's row was written.
    pub fn mark_stored(&mut self, tid: TupleId, table_id: TableId) {
        self.tid = Some(tid);
        self.table_id = Some(table_id);
    }

    /// Empties the slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
