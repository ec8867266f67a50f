use serde::Serialize;
use serde_json::Value;

use crate::models::{generate_id, IntegratorGroup, MemberKind, Relation, User};

use super::authz::{Action, Authorizer};
use super::database::Database;
use super::error::{ResultExt, ServiceError};
use super::resolver::{GroupIntegrators, Resolver};
use super::store::Item;

/// Rename or soft-delete a group; exactly one of the two.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupEdit {
    pub group_id: String,
    pub name: Option<String>,
    pub is_deleted: Option<bool>,
}

/// A worker together with the groups it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserGroups {
    pub user: User,
    pub groups: Vec<IntegratorGroup>,
}

pub struct GroupService {
    db: Database,
    authz: Authorizer,
    resolver: Resolver,
}

impl GroupService {
    pub fn new(db: Database) -> Self {
        Self {
            authz: Authorizer::new(db.clone()),
            resolver: Resolver::new(db.clone()),
            db,
        }
    }

    // ==================== Group Operations ====================

    pub async fn create_group(
        &self,
        creator_id: &str,
        owner_id: Option<&str>,
        name: &str,
    ) -> Result<IntegratorGroup, ServiceError> {
        let grant = self.authz.authorize(creator_id, owner_id, Action::Manage).await?;

        let group = IntegratorGroup::new(generate_id(), name);
        self.db
            .create_owned(&group, &grant.owner_id, MemberKind::Group)
            .await
            .context("Error creating integrator group")?;

        tracing::info!(group_id = %group.id, owner_id = %grant.owner_id, "Integrator group created");
        Ok(group)
    }

    /// Groups of the requester, or of one of their workers.
    pub async fn get_groups(
        &self,
        requester_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<IntegratorGroup>, ServiceError> {
        let grant = self
            .authz
            .authorize(requester_id, user_id, Action::Read)
            .await
            .context("Error getting worker")?;
        self.resolver
            .members::<IntegratorGroup>(&grant.owner_id, MemberKind::Group)
            .await
            .context("Error getting integrator groups")
    }

    pub async fn get_group(
        &self,
        requester_id: &str,
        manager_id: Option<&str>,
        group_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self.authz.authorize(requester_id, manager_id, Action::Inspect).await?;
        self.authz
            .require_member(&grant.owner_id, MemberKind::Group, group_id)
            .await
    }

    pub async fn edit_group(
        &self,
        requester_id: &str,
        owner_id: Option<&str>,
        edit: GroupEdit,
    ) -> Result<IntegratorGroup, ServiceError> {
        match (&edit.name, edit.is_deleted) {
            (Some(_), Some(_)) => {
                return Err(ServiceError::validation(
                    "isDeleted cannot be changed together with the name",
                ))
            }
            (None, None) => return Err(ServiceError::validation("Nothing to change")),
            _ => {}
        }

        let grant = self.authz.authorize(requester_id, owner_id, Action::Manage).await?;
        let groups = self
            .resolver
            .members::<IntegratorGroup>(&grant.owner_id, MemberKind::Group)
            .await
            .context("Error in groups")?;
        if !groups.iter().any(|group| group.id == edit.group_id) {
            return Err(ServiceError::validation("Manager does not have this group"));
        }

        let group: IntegratorGroup = match (edit.name, edit.is_deleted) {
            (_, Some(is_deleted)) => self.db.set_entity_deleted(&edit.group_id, is_deleted).await?,
            (Some(name), None) => {
                let mut changes = Item::new();
                changes.insert("integratorGroupName".to_string(), Value::String(name));
                self.db.update_entity(&edit.group_id, changes).await?
            }
            (None, None) => return Err(ServiceError::validation("Nothing to change")),
        };

        tracing::info!(
            group_id = %group.id,
            requester_id = %requester_id,
            is_deleted = ?group.is_deleted,
            "Integrator group updated"
        );
        Ok(group)
    }

    // ==================== Membership Operations ====================

    /// Adds a worker to one of the owner's groups. Adding an active member again is a no-op.
    pub async fn add_user_to_group(
        &self,
        requester_id: &str,
        manager_id: Option<&str>,
        group_id: &str,
        user_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self.authz.authorize(requester_id, manager_id, Action::Manage).await?;
        self.require_worker_and_group(&grant.owner_id, user_id, group_id).await?;

        let relation = self
            .upsert_membership(Relation::group(user_id, group_id))
            .await?;
        tracing::info!(user_id = %user_id, group_id = %group_id, "User added to group");
        Ok(relation)
    }

    pub async fn remove_user_from_group(
        &self,
        requester_id: &str,
        manager_id: Option<&str>,
        group_id: &str,
        user_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self.authz.authorize(requester_id, manager_id, Action::Manage).await?;
        if grant.owner_id == user_id {
            return Err(ServiceError::validation("A manager cannot be removed from a group!"));
        }
        self.require_worker_and_group(&grant.owner_id, user_id, group_id).await?;

        if self
            .db
            .find_relation(user_id, MemberKind::Group, group_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::validation("User not in group"));
        }
        let relation = self
            .db
            .set_relation_deleted(user_id, MemberKind::Group, group_id, true)
            .await?;

        tracing::info!(user_id = %user_id, group_id = %group_id, "User removed from group");
        Ok(relation)
    }

    /// Adds an owned integrator to an owned group. Adding an active member again is a no-op.
    pub async fn add_integrator_to_group(
        &self,
        requester_id: &str,
        manager_id: Option<&str>,
        group_id: &str,
        integrator_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self.authz.authorize(requester_id, manager_id, Action::Manage).await?;
        self.require_integrator_and_group(&grant.owner_id, integrator_id, group_id)
            .await?;

        let relation = self
            .upsert_membership(Relation::integrator(group_id, integrator_id))
            .await?;
        tracing::info!(integrator_id = %integrator_id, group_id = %group_id, "Integrator added to group");
        Ok(relation)
    }

    pub async fn remove_integrator_from_group(
        &self,
        requester_id: &str,
        manager_id: Option<&str>,
        group_id: &str,
        integrator_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self.authz.authorize(requester_id, manager_id, Action::Manage).await?;
        self.require_integrator_and_group(&grant.owner_id, integrator_id, group_id)
            .await?;

        if self
            .db
            .find_relation(group_id, MemberKind::Integrator, integrator_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::validation("Integrator not in group"));
        }
        let relation = self
            .db
            .set_relation_deleted(group_id, MemberKind::Integrator, integrator_id, true)
            .await?;

        tracing::info!(integrator_id = %integrator_id, group_id = %group_id, "Integrator removed from group");
        Ok(relation)
    }

    async fn require_worker_and_group(
        &self,
        owner_id: &str,
        user_id: &str,
        group_id: &str,
    ) -> Result<(), ServiceError> {
        if owner_id != user_id {
            self.authz
                .require_member(owner_id, MemberKind::User, user_id)
                .await
                .context("Error in managerHasWorkerWithID")?;
        }
        self.authz
            .require_member(owner_id, MemberKind::Group, group_id)
            .await
            .context("Error in managerHasGroupWithID")?;
        Ok(())
    }

    async fn require_integrator_and_group(
        &self,
        owner_id: &str,
        integrator_id: &str,
        group_id: &str,
    ) -> Result<(), ServiceError> {
        self.authz
            .require_member(owner_id, MemberKind::Integrator, integrator_id)
            .await
            .context("Error in managerHasIntegratorWithID")?;
        self.authz
            .require_member(owner_id, MemberKind::Group, group_id)
            .await
            .context("Error in managerHasGroupWithID")?;
        Ok(())
    }

    /// Restores a soft-deleted edge, creates a missing one, and leaves an active one alone.
    async fn upsert_membership(&self, relation: Relation) -> Result<Relation, ServiceError> {
        match self
            .db
            .find_relation(&relation.owner_id, relation.kind, &relation.member_id)
            .await?
        {
            Some(existing) if existing.is_active() => Ok(existing),
            Some(_) => {
                self.db
                    .set_relation_deleted(&relation.owner_id, relation.kind, &relation.member_id, false)
                    .await
            }
            None => {
                let relation = Relation {
                    is_deleted: Some(false),
                    ..relation
                };
                self.db.put_relation(&relation).await?;
                Ok(relation)
            }
        }
    }

    // ==================== Lookup Operations ====================

    pub async fn get_integrators_from_groups(
        &self,
        requester_id: &str,
        user_id: Option<&str>,
        group_ids: &[String],
    ) -> Result<Vec<GroupIntegrators>, ServiceError> {
        let grant = self
            .authz
            .authorize(requester_id, user_id, Action::Read)
            .await
            .context("Error getting worker")?;
        self.resolver
            .integrators_from_groups(&grant.owner_id, group_ids)
            .await
    }

    /// Every worker of the owner with its groups. Workers without groups get an empty list.
    pub async fn get_groups_for_users(
        &self,
        requester_id: &str,
        manager_id: Option<&str>,
    ) -> Result<Vec<UserGroups>, ServiceError> {
        let grant = self.authz.authorize(requester_id, manager_id, Action::Inspect).await?;
        let workers = self
            .resolver
            .members_or_empty::<User>(&grant.owner_id, MemberKind::User)
            .await?;

        let mut result = Vec::with_capacity(workers.len());
        for user in workers {
            let groups = self
                .resolver
                .members_or_empty::<IntegratorGroup>(&user.id, MemberKind::Group)
                .await
                .context("Error getting userGroups")?;
            result.push(UserGroups { user, groups });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Integrator, UserRole};
    use crate::services::InMemoryRelationStore;
    use std::sync::Arc;

    async fn seeded() -> (Database, GroupService) {
        let db = Database::new(Arc::new(InMemoryRelationStore::new()));
        db.put_entity(&User::new("svc", UserRole::SERVICE, vec![])).await.unwrap();
        db.create_owned(&User::new("m1", UserRole::MANAGER, vec![]), "svc", MemberKind::User)
            .await
            .unwrap();
        db.create_owned(&User::new("w1", UserRole::WORKER, vec![]), "m1", MemberKind::User)
            .await
            .unwrap();
        db.create_owned(&IntegratorGroup::new("g1", "Line"), "m1", MemberKind::Group)
            .await
            .unwrap();
        db.create_owned(&Integrator::new("i1", "Hall", "SN-1"), "m1", MemberKind::Integrator)
            .await
            .unwrap();
        (db.clone(), GroupService::new(db))
    }

    #[tokio::test]
    async fn adding_twice_keeps_one_active_edge() {
        let (db, groups) = seeded().await;
        let first = groups.add_user_to_group("m1", None, "g1", "w1").await.unwrap();
        let second = groups.add_user_to_group("m1", None, "g1", "w1").await.unwrap();

        assert_eq!(first, second);
        let edges = db.relations("w1", MemberKind::Group).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_active());
    }

    #[tokio::test]
    async fn remove_then_add_restores_membership() {
        let (db, groups) = seeded().await;
        groups.add_integrator_to_group("m1", None, "g1", "i1").await.unwrap();
        let removed = groups
            .remove_integrator_from_group("m1", None, "g1", "i1")
            .await
            .unwrap();
        assert!(!removed.is_active());

        let restored = groups.add_integrator_to_group("m1", None, "g1", "i1").await.unwrap();
        assert!(restored.is_active());
        assert_eq!(
            db.find_relation("g1", MemberKind::Integrator, "i1").await.unwrap(),
            Some(restored)
        );
    }

    #[tokio::test]
    async fn removing_a_non_member_fails() {
        let (_, groups) = seeded().await;
        let err = groups
            .remove_user_from_group("m1", None, "g1", "w1")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::validation("User not in group"));
    }

    #[tokio::test]
    async fn manager_cannot_be_removed() {
        let (_, groups) = seeded().await;
        let err = groups
            .remove_user_from_group("m1", None, "g1", "m1")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::validation("A manager cannot be removed from a group!"));
    }

    #[tokio::test]
    async fn foreign_group_is_rejected() {
        let (_, groups) = seeded().await;
        let err = groups
            .add_user_to_group("m1", None, "g9", "w1")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::validation(
                "Error in managerHasGroupWithID: Manager does not have an integrator group with this id: g9"
            )
        );
    }

    #[tokio::test]
    async fn rename_and_delete_are_exclusive() {
        let (_, groups) = seeded().await;
        let edit = GroupEdit {
            group_id: "g1".to_string(),
            name: Some("Renamed".to_string()),
            is_deleted: Some(true),
        };
        assert!(groups.edit_group("m1", None, edit).await.is_err());

        let renamed = groups
            .edit_group(
                "m1",
                None,
                GroupEdit {
                    group_id: "g1".to_string(),
                    name: Some("Renamed".to_string()),
                    is_deleted: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.integrator_group_name, "Renamed");
    }

    #[tokio::test]
    async fn groups_for_users_lists_every_worker() {
        let (_, groups) = seeded().await;
        groups.add_user_to_group("m1", None, "g1", "w1").await.unwrap();

        let listing = groups.get_groups_for_users("m1", None).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].user.id, "w1");
        assert_eq!(listing[0].groups[0].id, "g1");
    }
}
