//! Catalog data types for relation and column metadata.

use std::fmt;

use crate::datum::Type;

/// What kind of object a relation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelKind {
    /// Ordinary table.
    Table,
    /// View.
    View,
    /// Foreign table.
    ForeignTable,
    /// Index.
    Index,
    /// Sequence.
    Sequence,
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelKind::Table => "table",
            RelKind::View => "view",
            RelKind::ForeignTable => "foreign table",
            RelKind::Index => "index",
            RelKind::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

/// How rows of a relation are identified in the replication stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplicaIdentity {
    /// The primary key, if there is one.
    #[default]
    Default,
    /// The whole old row.
    Full,
    /// No identity at all.
    Nothing,
    /// The named unique index.
    Index(String),
}

/// Which changes a relation is published with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublicationActions {
    /// Inserts are published.
    pub insert: bool,
    /// Updates are published.
    pub update: bool,
    /// Deletes are published.
    pub delete: bool,
}

impl PublicationActions {
    /// Publishes every kind of change.
    pub const ALL: Self = Self {
        insert: true,
        update: true,
        delete: true,
    };
}

/// Metadata for a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: Type,
    /// Whether NULL is rejected.
    pub not_null: bool,
}

impl Column {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            not_null: false,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}
