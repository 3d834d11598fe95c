//! Wiring of the buffer pool, transaction manager and access methods.
//!
//! ```text
//! +---------------------------------------------------------+
//! |                         Engine                          |
//! |                                                         |
//! |  +-----------------+  +---------------+  +------------+ |
//! |  | Arc<BufferPool> |  | Arc<TxManager>|  | AmRegistry | |
//! |  | (pin / latch)   |  | (xids, waits) |  | ("heap")   | |
//! |  +--------+--------+  +---------------+  +------------+ |
//! +-----------+---------------------------------------------+
//!             |
//!             v
//!       +---------------------+
//!       |  storage::Storage   |
//!       +---------------------+
//! ```

mod error;

pub use error::EngineError;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, info};

use crate::catalog::{Column, Relation};
use crate::config::EngineConfig;
use crate::executor::ExecState;
use crate::heap::HeapAm;
use crate::storage::{BufferPool, Storage};
use crate::tableam::{AmRegistry, TableAccessMethod, TableId, table_create_storage};
use crate::tx::TransactionManager;

/// Owns the shared components and hands out relations and transactions.
pub struct Engine<S: Storage> {
    config: EngineConfig,
    pool: Arc<BufferPool<S>>,
    tx_manager: Arc<TransactionManager>,
    heap: Arc<HeapAm<S>>,
    registry: AmRegistry,
    next_table_id: AtomicU32,
}

impl<S: Storage + 'static> Engine<S> {
    /// Builds an engine over `storage` with the heap registered as `"heap"`.
    pub fn new(storage: S, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let pool = Arc::new(BufferPool::new(storage, config.buffer_pool_capacity));
        let tx_manager = Arc::new(TransactionManager::new());
        let heap = Arc::new(HeapAm::new(Arc::clone(&pool), Arc::clone(&tx_manager)));

        let registry = AmRegistry::new();
        registry.register(Arc::clone(&heap) as Arc<dyn TableAccessMethod>);

        Ok(Self {
            config,
            pool,
            tx_manager,
            heap,
            registry,
            next_table_id: AtomicU32::new(1),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool<S>> {
        &self.pool
    }

    pub fn tx_manager(&self) -> &Arc<TransactionManager> {
        &self.tx_manager
    }

    /// The built-in heap engine.
    pub fn heap(&self) -> &Arc<HeapAm<S>> {
        &self.heap
    }

    pub fn registry(&self) -> &AmRegistry {
        &self.registry
    }

    /// Creates an ordinary table stored by the access method `handler`.
    ///
    /// Indexes, triggers and constraints are added to the returned relation
    /// with its builder methods.
    pub async fn create_relation(
        &self,
        handler: &str,
        namespace: &str,
        name: &str,
        columns: Vec<Column>,
    ) -> Result<Relation, EngineError> {
        let am = self.registry.resolve(handler)?;
        let id = TableId(self.next_table_id.fetch_add(1, Ordering::Relaxed));
        let first_page = table_create_storage(am.as_ref(), id).await?;

        let mut rel = Relation::new(id, namespace, name, columns, am);
        rel.first_page = first_page;
        info!(table = %rel.qualified_name(), id = %id, am = handler, "created relation");
        Ok(rel)
    }

    /// Starts a transaction running as `user`.
    pub fn begin(&self, user: &str) -> ExecState {
        let txid = self.tx_manager.begin();
        ExecState::new(Arc::clone(&self.tx_manager), txid, user).with_locator_config(self.config.locator)
    }

    /// Commits the transaction of `state` and releases its row locks.
    pub fn commit(&self, state: &ExecState) -> Result<(), EngineError> {
        self.tx_manager.commit(state.txid())?;
        self.release_row_locks(state);
        Ok(())
    }

    /// Aborts the transaction of `state` and releases its row locks.
    pub fn abort(&self, state: &ExecState) -> Result<(), EngineError> {
        self.tx_manager.abort(state.txid())?;
        self.release_row_locks(state);
        Ok(())
    }

    fn release_row_locks(&self, state: &ExecState) {
        let released = self.heap.row_locks().release(state.txid());
        if released > 0 {
            debug!(xid = %state.txid(), rows = released, "released row locks");
        }
    }

    /// Writes every dirty page back and makes it durable.
    pub async fn sync(&self) -> Result<(), EngineError> {
        self.heap.sync().await?;
        Ok(())
    }
}
