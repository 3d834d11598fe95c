//! Relation descriptors: what the engine, executor and replication apply
//! need to know about a table.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::types::{Column, PublicationActions, RelKind, ReplicaIdentity};
use crate::datum::{Type, Value};
use crate::index::IndexAccess;
use crate::storage::PageId;
use crate::tableam::{TableAccessMethod, TableId};
use crate::trigger::RowTrigger;

/// One key column of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexColumn {
    /// A plain table column, by position.
    Column(usize),
    /// An expression; cannot serve as a replica identity key.
    Expression(String),
}

/// An index on a relation.
#[derive(Clone)]
pub struct IndexRelation {
    /// Index name.
    pub name: String,
    /// Key columns in index order.
    pub columns: Vec<IndexColumn>,
    /// Whether duplicate keys are rejected.
    pub unique: bool,
    /// Whether this is the primary key.
    pub primary: bool,
    /// Access to the index entries.
    pub access: Arc<dyn IndexAccess>,
}

impl IndexRelation {
    /// Creates a non-unique index over plain columns.
    pub fn new(name: impl Into<String>, columns: &[usize], access: Arc<dyn IndexAccess>) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().copied().map(IndexColumn::Column).collect(),
            unique: false,
            primary: false,
            access,
        }
    }

    /// Marks the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the index as the primary key (implies unique).
    pub fn primary(mut self) -> Self {
        self.unique = true;
        self.primary = true;
        self
    }

    /// Plain column positions used by the key, skipping expressions.
    pub fn plain_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.iter().filter_map(|c| match c {
            IndexColumn::Column(n) => Some(*n),
            IndexColumn::Expression(_) => None,
        })
    }

    /// True if any key column is an expression.
    pub fn has_expression(&self) -> bool {
        self.columns.iter().any(|c| matches!(c, IndexColumn::Expression(_)))
    }

    /// Extracts the key of `values`, or `None` if the key has an expression
    /// column.
    pub fn key_of(&self, values: &[Value]) -> Option<Vec<Value>> {
        self.columns
            .iter()
            .map(|c| match c {
                IndexColumn::Column(n) => Some(values.get(*n).cloned().unwrap_or(Value::Null)),
                IndexColumn::Expression(_) => None,
            })
            .collect()
    }
}

impl fmt::Debug for IndexRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexRelation")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("unique", &self.unique)
            .field("primary", &self.primary)
            .finish()
    }
}

/// When a trigger fires relative to the row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    /// Before the change; may modify or veto it.
    Before,
    /// After the change.
    After,
}

/// Which row change fired a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A row-level trigger attached to a relation.
#[derive(Clone)]
pub struct TriggerDef {
    /// Trigger name.
    pub name: String,
    /// Before or after the change.
    pub timing: TriggerTiming,
    /// Events the trigger fires for.
    pub events: Vec<TriggerEvent>,
    /// Arguments from the trigger definition.
    pub args: Vec<String>,
    /// The function to run.
    pub function: Arc<dyn RowTrigger>,
}

impl TriggerDef {
    /// Creates a trigger definition.
    pub fn new(
        name: impl Into<String>,
        timing: TriggerTiming,
        events: &[TriggerEvent],
        function: Arc<dyn RowTrigger>,
    ) -> Self {
        Self {
            name: name.into(),
            timing,
            events: events.to_vec(),
            args: Vec::new(),
            function,
        }
    }

    /// Sets the trigger arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the trigger fires for `event` at `timing`.
    pub fn fires_on(&self, timing: TriggerTiming, event: TriggerEvent) -> bool {
        self.timing == timing && self.events.contains(&event)
    }
}

impl fmt::Debug for TriggerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerDef")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .field("events", &self.events)
            .field("args", &self.args)
            .finish()
    }
}

/// Predicate of a CHECK constraint. `None` is SQL NULL, which passes.
pub type CheckFn = dyn Fn(&[Value]) -> Option<bool> + Send + Sync;

/// A CHECK constraint.
#[derive(Clone)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Predicate over the full row.
    pub check: Arc<CheckFn>,
}

impl CheckConstraint {
    /// Creates a CHECK constraint.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&[Value]) -> Option<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for CheckConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckConstraint").field("name", &self.name).finish()
    }
}

/// Everything known about one relation.
///
/// The access method is resolved once when the relation is opened and is
/// shared read-only by every user of the relation.
#[derive(Clone)]
pub struct Relation {
    /// Relation identifier.
    pub id: TableId,
    /// Namespace (schema) name.
    pub namespace: String,
    /// Relation name.
    pub name: String,
    /// Relation kind.
    pub kind: RelKind,
    /// Columns in order.
    pub columns: Vec<Column>,
    /// First page of the relation's storage.
    pub first_page: PageId,
    /// Indexes on the relation.
    pub indexes: Vec<IndexRelation>,
    /// Replica identity setting.
    pub replica_identity: ReplicaIdentity,
    /// Publication actions.
    pub publication: PublicationActions,
    /// Row triggers in definition order.
    pub triggers: Vec<TriggerDef>,
    /// CHECK constraints.
    pub checks: Vec<CheckConstraint>,
    am: Arc<dyn TableAccessMethod>,
}

impl Relation {
    /// Creates an ordinary table with no indexes, triggers or constraints.
    pub fn new(
        id: TableId,
        namespace: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<Column>,
        am: Arc<dyn TableAccessMethod>,
    ) -> Self {
        Self {
            id,
            namespace: namespace.into(),
            name: name.into(),
            kind: RelKind::Table,
            columns,
            first_page: PageId::INVALID,
            indexes: Vec::new(),
            replica_identity: ReplicaIdentity::Default,
            publication: PublicationActions::default(),
            triggers: Vec::new(),
            checks: Vec::new(),
            am,
        }
    }

    /// Sets the relation kind.
    pub fn with_kind(mut self, kind: RelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds an index.
    pub fn with_index(mut self, index: IndexRelation) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the replica identity.
    pub fn with_replica_identity(mut self, identity: ReplicaIdentity) -> Self {
        self.replica_identity = identity;
        self
    }

    /// Sets the publication actions.
    pub fn with_publication(mut self, actions: PublicationActions) -> Self {
        self.publication = actions;
        self
    }

    /// Appends a row trigger.
    pub fn with_trigger(mut self, trigger: TriggerDef) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Adds a CHECK constraint.
    pub fn with_check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    /// The relation's access method.
    pub fn am(&self) -> &dyn TableAccessMethod {
        self.am.as_ref()
    }

    /// A shared handle to the access method.
    pub fn am_handle(&self) -> Arc<dyn TableAccessMethod> {
        Arc::clone(&self.am)
    }

    /// `namespace.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Column types in order.
    pub fn schema(&self) -> Vec<Type> {
        self.columns.iter().map(|c| c.ty).collect()
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The unique index that identifies rows for replication, if any.
    pub fn replica_index(&self) -> Option<&IndexRelation> {
        match &self.replica_identity {
            ReplicaIdentity::Default => self.indexes.iter().find(|i| i.primary),
            ReplicaIdentity::Index(name) => self.indexes.iter().find(|i| i.unique && &i.name == name),
            ReplicaIdentity::Full | ReplicaIdentity::Nothing => None,
        }
    }

    /// Columns that appear in any index.
    ///
    /// An expression index may read any column, so it covers them all.
    pub fn indexed_columns(&self) -> BTreeSet<usize> {
        self.indexes.iter().flat_map(|i| self.covered_by(i)).collect()
    }

    /// Columns that appear in any unique index.
    pub fn key_columns(&self) -> BTreeSet<usize> {
        self.indexes
            .iter()
            .filter(|i| i.unique)
            .flat_map(|i| self.covered_by(i))
            .collect()
    }

    fn covered_by(&self, index: &IndexRelation) -> Vec<usize> {
        if index.has_expression() {
            (0..self.columns.len()).collect()
        } else {
            index.plain_columns().collect()
        }
    }

    /// Triggers that fire for `event` at `timing`, in definition order.
    pub fn triggers_for(
        &self,
        timing: TriggerTiming,
        event: TriggerEvent,
    ) -> impl Iterator<Item = &TriggerDef> {
        self.triggers.iter().filter(move |t| t.fires_on(timing, event))
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("id", &self.id)
            .field("name", &self.qualified_name())
            .field("kind", &self.kind)
            .field("columns", &self.columns)
            .field("first_page", &self.first_page)
            .field("indexes", &self.indexes)
            .field("replica_identity", &self.replica_identity)
            .field("am", &self.am.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    struct NullAm;

    #[async_trait::async_trait]
    impl TableAccessMethod for NullAm {
        fn name(&self) -> &'static str {
            "null"
        }
    }

    fn relation() -> Relation {
        let pk = IndexRelation::new("t_pkey", &[0], Arc::new(MemoryIndex::new())).primary();
        let by_name = IndexRelation::new("t_name", &[2], Arc::new(MemoryIndex::new()));
        let alt = IndexRelation::new("t_alt", &[1], Arc::new(MemoryIndex::new())).unique();
        Relation::new(
            TableId(1),
            "public",
            "t",
            vec![
                Column::new("id", Type::Int4).not_null(),
                Column::new("code", Type::Text),
                Column::new("name", Type::Text),
            ],
            Arc::new(NullAm),
        )
        .with_index(pk)
        .with_index(by_name)
        .with_index(alt)
    }

    #[test]
    fn test_replica_index_selection() {
        let rel = relation();
        assert_eq!(rel.replica_index().map(|i| i.name.as_str()), Some("t_pkey"));

        let rel = relation().with_replica_identity(ReplicaIdentity::Index("t_alt".into()));
        assert_eq!(rel.replica_index().map(|i| i.name.as_str()), Some("t_alt"));

        // A non-unique index never qualifies.
        let rel = relation().with_replica_identity(ReplicaIdentity::Index("t_name".into()));
        assert!(rel.replica_index().is_none());

        let rel = relation().with_replica_identity(ReplicaIdentity::Full);
        assert!(rel.replica_index().is_none());
    }

    #[test]
    fn test_column_sets() {
        let rel = relation();
        assert_eq!(rel.indexed_columns().into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(rel.key_columns().into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(rel.column_index("name"), Some(2));
        assert_eq!(rel.qualified_name(), "public.t");
        assert_eq!(rel.am().name(), "null");
    }

    #[test]
    fn test_key_of_with_expression() {
        let mut index = IndexRelation::new("e", &[0], Arc::new(MemoryIndex::new()));
        let values = vec![Value::Int32(1)];
        assert_eq!(index.key_of(&values), Some(vec![Value::Int32(1)]));
        index.columns.push(IndexColumn::Expression("lower(name)".into()));
        assert_eq!(index.key_of(&values), None);
        assert!(index.has_expression());
    }

    #[test]
    fn test_expression_index_covers_every_column() {
        let mut lower = IndexRelation::new("t_lower", &[], Arc::new(MemoryIndex::new()));
        lower.columns.push(IndexColumn::Expression("lower(name)".into()));
        let rel = Relation::new(
            TableId(2),
            "public",
            "u",
            vec![Column::new("id", Type::Int4), Column::new("name", Type::Text)],
            Arc::new(NullAm),
        )
        .with_index(lower);
        assert_eq!(rel.indexed_columns().into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert!(rel.key_columns().is_empty());
    }
}
