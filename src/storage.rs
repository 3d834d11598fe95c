//! Page service consumed by the table access methods.
//!
//! All table data lives in fixed 8KB pages. The heap engine only needs three
//! things from this layer: pin a page (optionally latched for reading or
//! writing), release it, and write dirty pages back durably.
//!
//! ```text
//! +-------------------+
//! | heap engine       |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | BufferPool        |  pin / latch / flush
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | Storage (trait)   |  raw page I/O
//! +-------------------+
//! ```

pub mod buffer;
pub mod error;
pub mod io;
pub mod page;

pub use buffer::{BufferPool, BufferPoolError, PagePin, PageReadGuard, PageWriteGuard};
pub use error::StorageError;
pub use io::{MemoryStorage, Storage};
pub use page::{PAGE_HEADER_SIZE, PAGE_SIZE, PageData, PageHeader, PageId};
