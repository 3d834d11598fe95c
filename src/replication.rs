//! Applying logical replication row changes to local tables.
//!
//! - [`check_subscription_relkind`], [`check_cmd_replica_identity`]: gates
//!   checked before any row is touched
//! - [`find_replica_tuple`]: locate and lock the local row a change refers to
//! - [`apply_insert`], [`apply_update`], [`apply_delete`]: whole row changes

mod apply;
mod error;
mod identity;
mod locator;

pub use apply::{
    ApplyOutcome, apply_delete, apply_insert, apply_update, exec_simple_relation_delete,
    exec_simple_relation_insert, exec_simple_relation_update,
};
pub use error::ReplicationError;
pub use identity::{CmdType, check_cmd_replica_identity, check_subscription_relkind};
pub use locator::{LookupStrategy, choose_strategy, find_by_index, find_by_seq, find_replica_tuple, rows_equal};
