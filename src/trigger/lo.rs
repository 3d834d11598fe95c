//! `lo_manage`: unlink large objects that a row stops referencing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{RowTrigger, TriggerAction, TriggerContext, TriggerError};
use crate::catalog::TriggerEvent;
use crate::datum::Value;

/// Storage of large objects addressed by id.
pub trait LargeObjectStore: Send + Sync {
    /// Removes the large object `oid`.
    fn unlink(&self, oid: u32) -> Result<(), TriggerError>;
}

/// In-memory [`LargeObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryLargeObjectStore {
    inner: Mutex<LargeObjects>,
}

#[derive(Debug, Default)]
struct LargeObjects {
    next_oid: u32,
    objects: HashMap<u32, Vec<u8>>,
}

impl MemoryLargeObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` and returns its id. Ids start at 1.
    pub fn create(&self, data: Vec<u8>) -> u32 {
        let mut inner = self.inner.lock();
        inner.next_oid += 1;
        let oid = inner.next_oid;
        inner.objects.insert(oid, data);
        oid
    }

    /// Returns true if `oid` exists.
    pub fn exists(&self, oid: u32) -> bool {
        self.inner.lock().objects.contains_key(&oid)
    }
}

impl LargeObjectStore for MemoryLargeObjectStore {
    fn unlink(&self, oid: u32) -> Result<(), TriggerError> {
        self.inner
            .lock()
            .objects
            .remove(&oid)
            .map(|_| ())
            .ok_or(TriggerError::LargeObjectNotFound(oid))
    }
}

/// Row trigger that unlinks the large object referenced by a column when
/// an UPDATE changes the reference or a DELETE removes the row.
pub struct LoManage {
    store: Arc<dyn LargeObjectStore>,
}

impl LoManage {
    /// Creates the trigger over `store`.
    pub fn new(store: Arc<dyn LargeObjectStore>) -> Self {
        Self { store }
    }

    fn unlink(&self, value: &Value) -> Result<(), TriggerError> {
        // a reference that does not parse unlinks object 0, which never exists
        let oid = value.to_string().parse::<u32>().unwrap_or(0);
        debug!(oid, "unlinking large object");
        self.store.unlink(oid)
    }
}

impl RowTrigger for LoManage {
    fn fire(&self, ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> {
        let Some(column) = ctx.args().first() else {
            return Err(TriggerError::NoColumnName {
                trigger: ctx.trigger.name.clone(),
            });
        };
        let Some(column) = ctx.relation.column_index(column) else {
            return Err(TriggerError::ColumnNotFound {
                trigger: ctx.trigger.name.clone(),
                column: column.clone(),
            });
        };

        let old = ctx
            .old_row
            .and_then(|row| row.get(column))
            .filter(|v| !v.is_null());

        match ctx.event {
            TriggerEvent::Update => {
                let new = ctx
                    .new_row
                    .as_deref()
                    .and_then(|row| row.get(column))
                    .filter(|v| !v.is_null());
                if let Some(old) = old
                    && new.is_none_or(|new| new.to_string() != old.to_string())
                {
                    self.unlink(old)?;
                }
            }
            TriggerEvent::Delete => {
                if let Some(old) = old {
                    self.unlink(old)?;
                }
            }
            TriggerEvent::Insert => {}
        }
        Ok(TriggerAction::Proceed)
    }
}
