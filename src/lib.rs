//! Pluggable table storage with an MVCC heap engine and logical
//! replication row apply.
//!
//! - [`tableam`]: the access method routing table and its `table_*` entry
//!   points
//! - [`heap`]: the built-in MVCC heap engine
//! - [`executor`]: triggers, constraints and index maintenance around writes
//! - [`replication`]: the replica tuple locator and row apply
//! - [`engine`]: wires the pieces together

pub mod catalog;
pub mod config;
pub mod datum;
pub mod engine;
pub mod executor;
pub mod heap;
pub mod index;
pub mod replication;
pub mod storage;
pub mod tableam;
pub mod trigger;
pub mod tx;
