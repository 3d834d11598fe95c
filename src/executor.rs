//! Executor hooks around row writes.
//!
//! The pieces the executor runs around an access method write: row
//! triggers, constraint checks and index maintenance. The current
//! transaction and command travel in an [`ExecState`].

mod constraint;
mod error;
mod index_tuples;
mod state;
mod trigger;

pub use constraint::check_constraints;
pub use error::ExecError;
pub use index_tuples::ExecIndexInserter;
pub use state::ExecState;
pub use trigger::{fire_after_row, fire_before_row};
