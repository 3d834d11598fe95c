//! `autoinc`: fill integer columns from sequences.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{RowTrigger, TriggerAction, TriggerContext, TriggerError};
use crate::datum::{Type, Value};

/// Named counters handed out by `nextval`.
#[derive(Debug, Default)]
pub struct Sequences {
    next: Mutex<HashMap<String, i64>>,
}

impl Sequences {
    /// Creates an empty set of sequences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sequence whose first value is 1.
    pub fn create(&self, name: impl Into<String>) {
        self.create_with_start(name, 1);
    }

    /// Creates (or resets) a sequence whose first value is `start`.
    pub fn create_with_start(&self, name: impl Into<String>, start: i64) {
        self.next.lock().insert(name.into(), start);
    }

    /// Returns the sequence's next value and advances it.
    pub fn nextval(&self, name: &str) -> Result<i64, TriggerError> {
        let mut next = self.next.lock();
        let value = next
            .get_mut(name)
            .ok_or_else(|| TriggerError::UnknownSequence(name.to_string()))?;
        let current = *value;
        *value += 1;
        Ok(current)
    }
}

/// BEFORE INSERT/UPDATE trigger that replaces NULL or zero `int4` columns
/// with the next value of a sequence.
///
/// Arguments are pairs of `(column, sequence)`.
pub struct AutoInc {
    sequences: Arc<Sequences>,
}

impl AutoInc {
    const NAME: &'static str = "autoinc";

    /// Creates the trigger drawing values from `sequences`.
    pub fn new(sequences: Arc<Sequences>) -> Self {
        Self { sequences }
    }

    fn nextval_int4(&self, sequence: &str) -> Result<i32, TriggerError> {
        // nextval is 64-bit; the column is int4
        let value = self.sequences.nextval(sequence)? as i32;
        if value != 0 {
            return Ok(value);
        }
        Ok(self.sequences.nextval(sequence)? as i32)
    }
}

impl RowTrigger for AutoInc {
    fn fire(&self, ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> {
        ctx.require_before_write()?;

        let args = ctx.args();
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(TriggerError::Arguments {
                function: Self::NAME,
                relation: ctx.relation.name.clone(),
                expected: "even number gt 0 of arguments was expected",
            });
        }

        let mut assignments = Vec::new();
        for pair in args.chunks(2) {
            let column = ctx.typed_attribute(&pair[0], Type::Int4, "INT4")?;
            let current = ctx
                .new_row
                .as_deref()
                .and_then(|row| row.get(column))
                .unwrap_or(&Value::Null);
            if matches!(current, Value::Int32(v) if *v != 0) {
                continue;
            }
            assignments.push((column, self.nextval_int4(&pair[1])?));
        }

        if let Some(row) = ctx.new_row.as_deref_mut() {
            for (column, value) in assignments {
                if let Some(slot) = row.get_mut(column) {
                    *slot = Value::Int32(value);
                }
            }
        }
        Ok(TriggerAction::Proceed)
    }
}
