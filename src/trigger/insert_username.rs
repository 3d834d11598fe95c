//! `insert_username`: record who wrote a row.

use super::{RowTrigger, TriggerAction, TriggerContext, TriggerError};
use crate::datum::{Type, Value};

/// BEFORE INSERT/UPDATE trigger that stores the session user in the text
/// column named by its single argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct InsertUsername;

impl InsertUsername {
    const NAME: &'static str = "insert_username";
}

impl RowTrigger for InsertUsername {
    fn fire(&self, ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> {
        ctx.require_before_write()
            .map_err(|e| e.within(Self::NAME))?;

        let [column] = ctx.args() else {
            return Err(TriggerError::Arguments {
                function: Self::NAME,
                relation: ctx.relation.name.clone(),
                expected: "one argument was expected",
            });
        };
        let column = ctx.typed_attribute(column, Type::Text, "TEXT")?;

        let user = Value::Text(ctx.user.to_string());
        if let Some(slot) = ctx.new_row.as_deref_mut().and_then(|row| row.get_mut(column)) {
            *slot = user;
        }
        Ok(TriggerAction::Proceed)
    }
}
