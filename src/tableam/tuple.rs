//! Opaque engine-owned handles.
//!
//! Callers hold tuples, scans and page pins through these wrappers and can
//! only inspect them through the routing table; each engine downcasts to
//! its own concrete type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::types::{LockOutcome, UpdateFailure};

/// A physical tuple owned by some engine.
#[derive(Clone)]
pub struct TableTuple(Arc<dyn Any + Send + Sync>);

impl TableTuple {
    /// Wraps an engine's tuple.
    pub fn new<T: Any + Send + Sync>(tuple: T) -> Self {
        Self(Arc::new(tuple))
    }

    /// The engine's tuple, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for TableTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TableTuple(..)")
    }
}

/// An engine's in-progress scan.
pub struct TableScan(Box<dyn Any + Send>);

impl TableScan {
    /// Wraps an engine's scan state.
    pub fn new<T: Any + Send>(scan: T) -> Self {
        Self(Box::new(scan))
    }

    /// The engine's scan state, if it is a `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }

    /// Takes the engine's scan state back, if it is a `T`.
    pub fn into_inner<T: Any>(self) -> Option<T> {
        self.0.downcast().ok().map(|b| *b)
    }
}

impl fmt::Debug for TableScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TableScan(..)")
    }
}

/// A page pin kept past a fetch. Dropping it releases the page.
pub struct BufferPin(#[allow(dead_code)] Box<dyn Any + Send + Sync>);

impl BufferPin {
    /// Wraps an engine's pin.
    pub fn new<T: Any + Send + Sync>(pin: T) -> Self {
        Self(Box::new(pin))
    }
}

impl fmt::Debug for BufferPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BufferPin(..)")
    }
}

/// Result of a fetch.
#[derive(Debug, Default)]
pub struct FetchResult {
    /// The visible version, if any.
    pub tuple: Option<TableTuple>,
    /// The kept pin, when requested and a version was found.
    pub pin: Option<BufferPin>,
}

/// Result of a row lock request.
#[derive(Debug, Clone)]
pub struct LockResult {
    /// What happened.
    pub outcome: LockOutcome,
    /// The newest version of the row on success.
    pub tuple: Option<TableTuple>,
    /// Set for every outcome other than `Acquired`.
    pub failure: Option<UpdateFailure>,
}
