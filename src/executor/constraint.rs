//! Constraint checks run before a row is written.

use super::error::ExecError;
use crate::catalog::Relation;
use crate::datum::Value;

/// Checks NOT NULL columns, then CHECK constraints in definition order.
///
/// A CHECK that evaluates to NULL passes.
pub fn check_constraints(rel: &Relation, values: &[Value]) -> Result<(), ExecError> {
    for (column, value) in rel.columns.iter().zip(values) {
        if column.not_null && value.is_null() {
            return Err(ExecError::NotNullViolation {
                relation: rel.name.clone(),
                column: column.name.clone(),
            });
        }
    }

    for check in &rel.checks {
        if (check.check)(values) == Some(false) {
            return Err(ExecError::CheckViolation {
                relation: rel.name.clone(),
                constraint: check.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CheckConstraint, Column};
    use crate::datum::Type;
    use crate::trigger::test_support::relation;

    fn positive(values: &[Value]) -> Option<bool> {
        match values.first()? {
            Value::Int32(n) => Some(*n > 0),
            _ => None,
        }
    }

    #[test]
    fn test_not_null() {
        let mut rel = relation(&[("id", Type::Int4), ("name", Type::Text)]);
        rel.columns[1] = Column::new("name", Type::Text).not_null();

        check_constraints(&rel, &[Value::Null, Value::Text("a".into())]).unwrap();
        let err = check_constraints(&rel, &[Value::Int32(1), Value::Null]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "null value in column \"name\" of relation \"t\" violates not-null constraint"
        );
    }

    #[test]
    fn test_check_null_passes() {
        let rel = relation(&[("id", Type::Int4)]).with_check(CheckConstraint::new("t_id_check", positive));

        check_constraints(&rel, &[Value::Int32(3)]).unwrap();
        check_constraints(&rel, &[Value::Null]).unwrap();
        let err = check_constraints(&rel, &[Value::Int32(-1)]).unwrap_err();
        assert!(matches!(err, ExecError::CheckViolation { constraint, .. } if constraint == "t_id_check"));
    }
}
