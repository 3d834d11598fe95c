//! Trigger errors.

/// Errors raised by trigger functions.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Fired AFTER the change by a trigger that must run BEFORE it.
    #[error("must be fired before event")]
    MustFireBefore,

    /// Fired for DELETE by a trigger that only handles row writes.
    #[error("cannot process DELETE events")]
    CannotProcessDelete,

    /// The trigger definition has the wrong number of arguments.
    #[error("{function} ({relation}): {expected}")]
    Arguments {
        /// Trigger function name.
        function: &'static str,
        /// Relation name.
        relation: String,
        /// What was expected.
        expected: &'static str,
    },

    /// An argument names a column the relation does not have.
    #[error("\"{relation}\" has no attribute \"{column}\"")]
    NoAttribute {
        /// Relation name.
        relation: String,
        /// Column name.
        column: String,
    },

    /// An argument names a column of the wrong type.
    #[error("attribute \"{column}\" of \"{relation}\" must be type {expected}")]
    AttributeType {
        /// Column name.
        column: String,
        /// Relation name.
        relation: String,
        /// Required type.
        expected: &'static str,
    },

    /// The new row does not have one value per column.
    #[error("row has {actual} columns, relation \"{relation}\" has {expected}")]
    ColumnCountMismatch {
        /// Relation name.
        relation: String,
        /// Columns in the relation.
        expected: usize,
        /// Values in the row.
        actual: usize,
    },

    /// The trigger definition names no column.
    #[error("{trigger}: no column name provided in the trigger definition")]
    NoColumnName {
        /// Trigger name.
        trigger: String,
    },

    /// The column named by the trigger definition does not exist.
    #[error("{trigger}: column \"{column}\" does not exist")]
    ColumnNotFound {
        /// Trigger name.
        trigger: String,
        /// Column name.
        column: String,
    },

    /// `nextval` on a sequence that was never created.
    #[error("relation \"{0}\" does not exist")]
    UnknownSequence(String),

    /// Unlink of a large object that does not exist.
    #[error("large object {0} does not exist")]
    LargeObjectNotFound(u32),

    /// An error annotated with the name of the function that raised it.
    #[error("{function}: {source}")]
    In {
        /// Trigger function name.
        function: &'static str,
        /// Underlying error.
        source: Box<TriggerError>,
    },

    /// An error raised by a user-supplied trigger.
    #[error("{trigger}: {message}")]
    Raised {
        /// Trigger name.
        trigger: String,
        /// Message.
        message: String,
    },
}

impl TriggerError {
    /// Prefixes the error with `function`.
    pub fn within(self, function: &'static str) -> Self {
        TriggerError::In {
            function,
            source: Box::new(self),
        }
    }
}
