//! Relation metadata.
//!
//! A [`Relation`] bundles what every layer needs to operate on a table: its
//! columns, the access method that stores it, its indexes, its replication
//! settings, and the row triggers and CHECK constraints the executor runs.

mod relation;
mod types;

pub use relation::{
    CheckConstraint, CheckFn, IndexColumn, IndexRelation, Relation, TriggerDef, TriggerEvent, TriggerTiming,
};
pub use types::{Column, PublicationActions, RelKind, ReplicaIdentity};
