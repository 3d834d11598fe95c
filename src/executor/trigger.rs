//! Row trigger invocation points.

use tracing::debug;

use super::error::ExecError;
use super::state::ExecState;
use crate::catalog::{Relation, TriggerEvent, TriggerTiming};
use crate::datum::Value;
use crate::trigger::{TriggerAction, TriggerContext};

/// Fires BEFORE row triggers in definition order.
///
/// Each trigger sees the row as left by the previous one. Returns
/// [`TriggerAction::Skip`] as soon as one vetoes the change.
pub fn fire_before_row(
    state: &ExecState,
    rel: &Relation,
    event: TriggerEvent,
    old_row: Option<&[Value]>,
    mut new_row: Option<&mut Vec<Value>>,
) -> Result<TriggerAction, ExecError> {
    for trigger in rel.triggers_for(TriggerTiming::Before, event) {
        let mut ctx = TriggerContext {
            relation: rel,
            trigger,
            timing: TriggerTiming::Before,
            event,
            old_row,
            new_row: new_row.as_deref_mut(),
            user: state.user(),
        };
        if trigger.function.fire(&mut ctx)? == TriggerAction::Skip {
            debug!(table = %rel.name, trigger = %trigger.name, %event, "row change suppressed by trigger");
            return Ok(TriggerAction::Skip);
        }
    }
    Ok(TriggerAction::Proceed)
}

/// Fires AFTER row triggers in definition order.
pub fn fire_after_row(
    state: &ExecState,
    rel: &Relation,
    event: TriggerEvent,
    old_row: Option<&[Value]>,
    new_row: Option<&[Value]>,
) -> Result<(), ExecError> {
    for trigger in rel.triggers_for(TriggerTiming::After, event) {
        // after triggers see a copy; the row is already written
        let mut new_copy = new_row.map(<[Value]>::to_vec);
        let mut ctx = TriggerContext {
            relation: rel,
            trigger,
            timing: TriggerTiming::After,
            event,
            old_row,
            new_row: new_copy.as_mut(),
            user: state.user(),
        };
        trigger.function.fire(&mut ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::catalog::TriggerDef;
    use crate::datum::Type;
    use crate::trigger::{RowTrigger, TriggerError, test_support::relation};
    use crate::tx::TransactionManager;

    struct Append(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl RowTrigger for Append {
        fn fire(&self, ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> {
            self.1.lock().push(self.0);
            if let Some(row) = ctx.new_row.as_deref_mut() {
                if let Value::Text(s) = &mut row[0] {
                    s.push_str(self.0);
                }
            }
            Ok(TriggerAction::Proceed)
        }
    }

    struct Veto;

    impl RowTrigger for Veto {
        fn fire(&self, _ctx: &mut TriggerContext<'_>) -> Result<TriggerAction, TriggerError> {
            Ok(TriggerAction::Skip)
        }
    }

    fn state() -> ExecState {
        let txm = Arc::new(TransactionManager::new());
        let txid = txm.begin();
        ExecState::new(txm, txid, "alice")
    }

    #[test]
    fn test_before_triggers_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let rel = relation(&[("s", Type::Text)])
            .with_trigger(TriggerDef::new(
                "b",
                TriggerTiming::Before,
                &[TriggerEvent::Insert],
                Arc::new(Append("b", Arc::clone(&log))),
            ))
            .with_trigger(TriggerDef::new(
                "a",
                TriggerTiming::Before,
                &[TriggerEvent::Insert],
                Arc::new(Append("a", Arc::clone(&log))),
            ))
            .with_trigger(TriggerDef::new(
                "after",
                TriggerTiming::After,
                &[TriggerEvent::Insert],
                Arc::new(Append("after", Arc::clone(&log))),
            ));

        let mut row = vec![Value::Text(String::new())];
        let action = fire_before_row(&state(), &rel, TriggerEvent::Insert, None, Some(&mut row)).unwrap();
        assert_eq!(action, TriggerAction::Proceed);
        assert_eq!(row[0], Value::Text("ba".into()));
        assert_eq!(*log.lock(), vec!["b", "a"]);

        fire_after_row(&state(), &rel, TriggerEvent::Insert, None, Some(&row)).unwrap();
        assert_eq!(row[0], Value::Text("ba".into()));
        assert_eq!(*log.lock(), vec!["b", "a", "after"]);
    }

    #[test]
    fn test_veto_stops_later_triggers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let rel = relation(&[("s", Type::Text)])
            .with_trigger(TriggerDef::new(
                "veto",
                TriggerTiming::Before,
                &[TriggerEvent::Delete],
                Arc::new(Veto),
            ))
            .with_trigger(TriggerDef::new(
                "never",
                TriggerTiming::Before,
                &[TriggerEvent::Delete],
                Arc::new(Append("never", Arc::clone(&log))),
            ));

        let old = vec![Value::Text("x".into())];
        let action = fire_before_row(&state(), &rel, TriggerEvent::Delete, Some(&old), None).unwrap();
        assert_eq!(action, TriggerAction::Skip);
        assert!(log.lock().is_empty());
    }
}
