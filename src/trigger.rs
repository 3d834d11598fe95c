//! Row-level triggers.
//!
//! A trigger is an opaque callback attached to a relation through a
//! [`TriggerDef`](crate::catalog::TriggerDef). The executor fires BEFORE
//! triggers in definition order before a row is written; each may rewrite
//! the new row or veto the change. AFTER triggers observe the finished
//! change and cannot veto it.
//!
//! Three ready-made triggers are provided:
//!
//! - [`AutoInc`]: fills zero or NULL integer columns from sequences
//! - [`InsertUsername`]: stamps the session user into a text column
//! - [`LoManage`]: unlinks large objects orphaned by UPDATE or DELETE

mod autoinc;
mod error;
mod insert_username;
mod lo;

pub use autoinc::{AutoInc, Sequences};
pub use error::TriggerError;
pub use insert_username::InsertUsername;
pub use lo::{LargeObjectStore, LoManage, MemoryLargeObjectStore};

use crate::catalog::{Relation, TriggerDef, TriggerEvent, TriggerTiming};
use crate::datum::{Type, Value};

/// What the executor should do after a BEFORE trigger returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Continue with the (possibly modified) row.
    Proceed,
    /// Suppress the change for this row.
    Skip,
}

/// Everything a trigger function sees when it fires.
pub struct TriggerContext<'a> {
    /// Relation the row belongs to.
    pub relation: &'a Relation,
    /// The firing trigger's definition.
    pub trigger: &'a TriggerDef,
    /// Before or after the change.
    pub timing: TriggerTiming,
    /// The change being made.
    pub event: TriggerEvent,
    /// The existing row, for UPDATE and DELETE.
    pub old_row: Option<&'a [Value]>,
    /// The row being written, for INSERT and UPDATE. Only BEFORE triggers
    /// may change it.
    pub new_row: Option<&'a mut Vec<Value>>,
    /// Session user the change runs as.
    pub user: &'a str,
}

impl TriggerContext<'_> {
    /// Trigger arguments from the definition.
    pub fn args(&self) -> &[String] {
        &self.trigger.args
    }

    /// Position of `column` in the relation, or a "has no attribute" error.
    fn attribute(&self, column: &str) -> Result<usize, TriggerError> {
        self.relation
            .column_index(column)
            .ok_or_else(|| TriggerError::NoAttribute {
                relation: self.relation.name.clone(),
                column: column.to_string(),
            })
    }

    /// Like [`attribute`](Self::attribute), also requiring the column type.
    fn typed_attribute(
        &self,
        column: &str,
        ty: Type,
        type_name: &'static str,
    ) -> Result<usize, TriggerError> {
        let n = self.attribute(column)?;
        if self.relation.columns[n].ty != ty {
            return Err(TriggerError::AttributeType {
                column: column.to_string(),
                relation: self.relation.name.clone(),
                expected: type_name,
            });
        }
        Ok(n)
    }

    /// Fails unless fired BEFORE an INSERT or UPDATE whose new row has one
    /// value per column.
    fn require_before_write(&self) -> Result<(), TriggerError> {
        if self.timing != TriggerTiming::Before {
            return Err(TriggerError::MustFireBefore);
        }
        if self.event == TriggerEvent::Delete {
            return Err(TriggerError::CannotProcessDelete);
        }
        match self.new_row.as_deref() {
            Some(row) if row.len() != self.relation.columns.len() => Err(TriggerError::ColumnCountMismatch {
                relation: self.relation.name.clone(),
                expected: self.relation.columns.len(),
                actual: row.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// A row-level trigger function.
pub trait RowTrigger: Send + Sync {
    /// Runs the trigger for one row.
    ///
    /// The return value is ignored for AFTER triggers.
    fn fire(&self, ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError>;
}

impl<F> RowTrigger for F
where
    F: Fn(&mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> + Send + Sync,
{
    fn fire(&self, ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> {
        self(ctx)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::catalog::{Column, Relation};
    use crate::datum::Type;
    use crate::tableam::{TableAccessMethod, TableId};

    struct NoStorage;

    #[async_trait]
    impl TableAccessMethod for NoStorage {
        fn name(&self) -> &'static str {
            "none"
        }
    }

    pub(crate) fn relation(columns: &[(&str, Type)]) -> Relation {
        let columns = columns.iter().map(|(n, ty)| Column::new(*n, *ty)).collect();
        Relation::new(TableId(7), "public", "t", columns, Arc::new(NoStorage))
    }
}
