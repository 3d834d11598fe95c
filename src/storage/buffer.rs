//! Resident page cache with pin counting and page latches.
//!
//! - [`BufferPool`]: page table and page access entry points
//! - [`PageReadGuard`], [`PageWriteGuard`]: latched access, unpinned on drop
//! - [`PagePin`]: a pin without a latch, for callers that keep a page
//!   resident between operations
//!
//! # Latch Hierarchy
//!
//! 1. Page table mutex (never held across an `.await`)
//! 2. Page data RwLocks
//!
//! Never take the page table mutex while waiting on a page latch.

mod error;
mod frame;
mod guard;
mod pool;

pub use error::BufferPoolError;
pub use guard::{PagePin, PageReadGuard, PageWriteGuard};
pub use pool::BufferPool;
