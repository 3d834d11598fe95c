//! Gates checked before a replicated change touches a relation.

use super::error::ReplicationError;
use crate::catalog::{RelKind, Relation, ReplicaIdentity};

/// Kind of row change being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdType {
    Insert,
    Update,
    Delete,
}

/// Fails if `cmd` cannot be replicated for `rel` because the relation has
/// no way to identify rows yet publishes that kind of change.
///
/// INSERT never needs a replica identity.
pub fn check_cmd_replica_identity(rel: &Relation, cmd: CmdType) -> Result<(), ReplicationError> {
    if rel.kind != RelKind::Table {
        return Ok(());
    }
    if cmd == CmdType::Insert {
        return Ok(());
    }
    if rel.replica_identity == ReplicaIdentity::Full || rel.replica_index().is_some() {
        return Ok(());
    }

    match cmd {
        CmdType::Update if rel.publication.update => Err(ReplicationError::MissingReplicaIdentity {
            message: format!(
                "cannot update table \"{}\" because it does not have a replica identity and publishes updates",
                rel.name
            ),
            hint: "To enable updating the table, set REPLICA IDENTITY using ALTER TABLE.",
        }),
        CmdType::Delete if rel.publication.delete => Err(ReplicationError::MissingReplicaIdentity {
            message: format!(
                "cannot delete from table \"{}\" because it does not have a replica identity and publishes deletes",
                rel.name
            ),
            hint: "To enable deleting from the table, set REPLICA IDENTITY using ALTER TABLE.",
        }),
        _ => Ok(()),
    }
}

/// Fails unless a relation of `kind` can be the target of apply.
pub fn check_subscription_relkind(kind: RelKind, namespace: &str, name: &str) -> Result<(), ReplicationError> {
    if kind != RelKind::Table {
        return Err(ReplicationError::NotATable {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{IndexRelation, PublicationActions};
    use crate::datum::Type;
    use crate::index::MemoryIndex;
    use crate::trigger::test_support::relation;

    fn no_identity() -> Relation {
        relation(&[("id", Type::Int4), ("val", Type::Text)]).with_publication(PublicationActions::ALL)
    }

    #[test]
    fn test_missing_identity_rejects_published_changes() {
        let rel = no_identity();
        check_cmd_replica_identity(&rel, CmdType::Insert).unwrap();

        let err = check_cmd_replica_identity(&rel, CmdType::Update).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot update table \"t\" because it does not have a replica identity and publishes updates"
        );
        assert_eq!(
            err.hint(),
            Some("To enable updating the table, set REPLICA IDENTITY using ALTER TABLE.")
        );

        let err = check_cmd_replica_identity(&rel, CmdType::Delete).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot delete from table \"t\" because it does not have a replica identity and publishes deletes"
        );
        assert_eq!(
            err.hint(),
            Some("To enable deleting from the table, set REPLICA IDENTITY using ALTER TABLE.")
        );
    }

    #[test]
    fn test_identity_or_unpublished_passes() {
        let unpublished = relation(&[("id", Type::Int4)]);
        check_cmd_replica_identity(&unpublished, CmdType::Update).unwrap();
        check_cmd_replica_identity(&unpublished, CmdType::Delete).unwrap();

        let full = no_identity().with_replica_identity(ReplicaIdentity::Full);
        check_cmd_replica_identity(&full, CmdType::Delete).unwrap();

        let keyed = no_identity()
            .with_index(IndexRelation::new("t_pkey", &[0], Arc::new(MemoryIndex::new())).primary());
        check_cmd_replica_identity(&keyed, CmdType::Update).unwrap();

        let nothing = keyed.with_replica_identity(ReplicaIdentity::Nothing);
        assert!(check_cmd_replica_identity(&nothing, CmdType::Update).is_err());
    }

    #[test]
    fn test_relkind_gate() {
        check_subscription_relkind(RelKind::Table, "public", "t").unwrap();
        for kind in [RelKind::View, RelKind::ForeignTable, RelKind::Sequence] {
            let err = check_subscription_relkind(kind, "public", "t").unwrap_err();
            assert_eq!(
                err.to_string(),
                "logical replication target relation \"public.t\" is not a table"
            );
        }
    }
}
