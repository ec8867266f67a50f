use std::collections::HashSet;

use serde_json::Value;

use crate::models::{generate_id, Integrator, IntegratorStatus, MemberKind, Relation, UsageEntry};

use super::authz::{Action, Authorizer, Role};
use super::database::Database;
use super::error::{ResultExt, ServiceError};
use super::resolver::Resolver;
use super::store::Item;

/// Requested changes to one integrator. `is_deleted` cannot be combined with the other fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegratorEdit {
    pub integrator_id: String,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub status: Option<IntegratorStatus>,
    pub is_deleted: Option<bool>,
}

impl IntegratorEdit {
    fn has_field_changes(&self) -> bool {
        self.location.is_some() || self.serial_number.is_some() || self.status.is_some()
    }
}

pub struct IntegratorService {
    db: Database,
    authz: Authorizer,
    resolver: Resolver,
}

impl IntegratorService {
    pub fn new(db: Database) -> Self {
        Self {
            authz: Authorizer::new(db.clone()),
            resolver: Resolver::new(db.clone()),
            db,
        }
    }

    pub async fn create_integrator(
        &self,
        creator_id: &str,
        owner_id: Option<&str>,
        location: &str,
        serial_number: &str,
    ) -> Result<Integrator, ServiceError> {
        let grant = self.authz.authorize(creator_id, owner_id, Action::Manage).await?;

        let integrator = Integrator::new(generate_id(), location, serial_number);
        self.db
            .create_owned(&integrator, &grant.owner_id, MemberKind::Integrator)
            .await
            .context("Error creating integrator")?;

        tracing::info!(
            integrator_id = %integrator.id,
            owner_id = %grant.owner_id,
            creator_id = %creator_id,
            "Integrator created"
        );
        Ok(integrator)
    }

    pub async fn get_integrators(
        &self,
        user_id: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<Integrator>, ServiceError> {
        let grant = self.authz.authorize(user_id, owner_id, Action::Inspect).await?;
        self.resolver
            .members::<Integrator>(&grant.owner_id, MemberKind::Integrator)
            .await
            .context("Error getting integrators")
    }

    /// The `manager -> integrator` adjacency row.
    pub async fn get_integrator(
        &self,
        user_id: &str,
        manager_id: Option<&str>,
        integrator_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self.authz.authorize(user_id, manager_id, Action::Inspect).await?;
        self.authz
            .require_member(&grant.owner_id, MemberKind::Integrator, integrator_id)
            .await
    }

    /// Managers and service users edit any integrator of the owner; workers may only
    /// switch the status of integrators reachable through their groups.
    pub async fn edit_integrator(
        &self,
        requester_id: &str,
        owner_id: Option<&str>,
        edit: IntegratorEdit,
    ) -> Result<Integrator, ServiceError> {
        if edit.is_deleted.is_some() && edit.has_field_changes() {
            return Err(ServiceError::validation(
                "isDeleted cannot be changed together with other fields",
            ));
        }
        if edit.is_deleted.is_none() && !edit.has_field_changes() {
            return Err(ServiceError::validation("Nothing to change"));
        }

        let grant = self.authz.authorize(requester_id, owner_id, Action::Operate).await?;

        if grant.role == Role::Worker {
            if edit.is_deleted.is_some() {
                return Err(ServiceError::forbidden("Worker cannot delete an integrator"));
            }
            if edit.location.is_some() || edit.serial_number.is_some() {
                return Err(ServiceError::forbidden("Worker can only change the integrator status"));
            }
            let groups = self.resolver.member_ids(&grant.owner_id, MemberKind::Group).await?;
            let reachable = self
                .resolver
                .integrators_from_groups(&grant.owner_id, &groups)
                .await
                .context("Error in integratorsFromGroups")?;
            let found = reachable
                .iter()
                .flat_map(|group| group.integrators.iter())
                .any(|integrator| integrator.id == edit.integrator_id);
            if !found {
                return Err(ServiceError::forbidden(
                    "User does not have access to this integrator",
                ));
            }
        } else {
            let owned = self
                .resolver
                .members::<Integrator>(&grant.owner_id, MemberKind::Integrator)
                .await
                .context("Error in integrator")?;
            if !owned.iter().any(|integrator| integrator.id == edit.integrator_id) {
                return Err(ServiceError::validation("Manager does not have this integrator"));
            }
        }

        let updated: Integrator = match edit.is_deleted {
            Some(is_deleted) => {
                self.db
                    .set_entity_deleted(&edit.integrator_id, is_deleted)
                    .await?
            }
            None => {
                let mut changes = Item::new();
                if let Some(location) = edit.location {
                    changes.insert("location".to_string(), Value::String(location));
                }
                if let Some(serial_number) = edit.serial_number {
                    changes.insert("serialNumber".to_string(), Value::String(serial_number));
                }
                if let Some(status) = edit.status {
                    let status = serde_json::to_value(status)
                        .map_err(|e| ServiceError::internal(e.to_string()))?;
                    changes.insert("status".to_string(), status);
                }
                self.db.update_entity(&edit.integrator_id, changes).await?
            }
        };

        tracing::info!(
            integrator_id = %updated.id,
            requester_id = %requester_id,
            status = ?updated.status,
            is_deleted = ?updated.is_deleted,
            "Integrator updated"
        );
        Ok(updated)
    }

    /// Loads usage entries for an owned integrator. Nothing is written unless every entry is valid.
    pub async fn create_entries(
        &self,
        creator_id: &str,
        owner_id: Option<&str>,
        integrator_id: &str,
        entries: Vec<(String, f64)>,
    ) -> Result<Vec<UsageEntry>, ServiceError> {
        let grant = self.authz.authorize(creator_id, owner_id, Action::Seed).await?;
        self.authz
            .require_member(&grant.owner_id, MemberKind::Integrator, integrator_id)
            .await
            .context("Error in managerHasIntegrator")?;

        if entries.is_empty() {
            return Err(ServiceError::validation("entries cannot be empty"));
        }
        if let Some((timestamp, _)) = entries
            .iter()
            .find(|(timestamp, _)| timestamp.is_empty() || UsageEntry::is_reserved_key(timestamp))
        {
            return Err(ServiceError::validation(format!("Invalid entry SK: {}", timestamp)));
        }
        let mut seen = HashSet::new();
        if let Some((timestamp, _)) = entries
            .iter()
            .find(|(timestamp, _)| !seen.insert(timestamp.as_str()))
        {
            return Err(ServiceError::validation(format!("Duplicate entry SK: {}", timestamp)));
        }
        if entries.iter().any(|(_, total)| !(*total > 0.0)) {
            return Err(ServiceError::validation("totalCrushed must be greater than 0!"));
        }

        let entries: Vec<UsageEntry> = entries
            .into_iter()
            .map(|(timestamp, total_crushed)| UsageEntry {
                integrator_id: integrator_id.to_string(),
                timestamp,
                total_crushed,
            })
            .collect();
        self.db.put_entries(&entries).await?;

        tracing::info!(
            integrator_id = %integrator_id,
            owner_id = %grant.owner_id,
            count = entries.len(),
            "Usage entries created"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntegratorGroup, User, UserRole};
    use crate::services::InMemoryRelationStore;
    use std::sync::Arc;

    async fn seeded() -> (Database, IntegratorService) {
        let db = Database::new(Arc::new(InMemoryRelationStore::new()));
        db.put_entity(&User::new("svc", UserRole::SERVICE, vec![])).await.unwrap();
        db.create_owned(&User::new("m1", UserRole::MANAGER, vec![]), "svc", MemberKind::User)
            .await
            .unwrap();
        db.create_owned(&User::new("w1", UserRole::WORKER, vec![]), "m1", MemberKind::User)
            .await
            .unwrap();
        db.create_owned(&Integrator::new("i1", "Hall", "SN-1"), "m1", MemberKind::Integrator)
            .await
            .unwrap();
        (db.clone(), IntegratorService::new(db))
    }

    fn status_edit(id: &str, status: IntegratorStatus) -> IntegratorEdit {
        IntegratorEdit {
            integrator_id: id.to_string(),
            status: Some(status),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn worker_needs_group_access_to_switch_status() {
        let (db, service) = seeded().await;

        let err = service
            .edit_integrator("w1", None, status_edit("i1", IntegratorStatus::Off))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::forbidden("User does not have access to this integrator")
        );

        db.create_owned(&IntegratorGroup::new("g1", "Line"), "m1", MemberKind::Group)
            .await
            .unwrap();
        db.put_relation(&Relation::group("w1", "g1")).await.unwrap();
        db.put_relation(&Relation::integrator("g1", "i1")).await.unwrap();

        let updated = service
            .edit_integrator("w1", None, status_edit("i1", IntegratorStatus::Off))
            .await
            .unwrap();
        assert_eq!(updated.status, IntegratorStatus::Off);
        assert_eq!(updated.location, "Hall");
    }

    #[tokio::test]
    async fn worker_cannot_delete() {
        let (_, service) = seeded().await;
        let edit = IntegratorEdit {
            integrator_id: "i1".to_string(),
            is_deleted: Some(true),
            ..Default::default()
        };
        let err = service.edit_integrator("w1", None, edit).await.unwrap_err();
        assert_eq!(err, ServiceError::forbidden("Worker cannot delete an integrator"));
    }

    #[tokio::test]
    async fn delete_flag_is_exclusive() {
        let (_, service) = seeded().await;
        let edit = IntegratorEdit {
            integrator_id: "i1".to_string(),
            location: Some("Hall B".to_string()),
            is_deleted: Some(true),
            ..Default::default()
        };
        let err = service.edit_integrator("m1", None, edit).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn service_edits_on_behalf_of_manager() {
        let (_, service) = seeded().await;
        let edit = IntegratorEdit {
            integrator_id: "i1".to_string(),
            location: Some("Hall B".to_string()),
            ..Default::default()
        };
        let updated = service.edit_integrator("svc", Some("m1"), edit).await.unwrap();
        assert_eq!(updated.location, "Hall B");

        let err = service
            .edit_integrator("svc", Some("m1"), status_edit("i9", IntegratorStatus::Off))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::validation("Manager does not have this integrator"));
    }

    #[tokio::test]
    async fn entries_require_positive_totals() {
        let (db, service) = seeded().await;
        let err = service
            .create_entries(
                "svc",
                Some("m1"),
                "i1",
                vec![("2024-01-01".to_string(), 2.0), ("2024-01-02".to_string(), 0.0)],
            )
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::validation("totalCrushed must be greater than 0!"));
        assert!(db.entries_between("i1", "0", "9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_service_users_seed_entries() {
        let (_, service) = seeded().await;
        let err = service
            .create_entries("m1", None, "i1", vec![("2024-01-01".to_string(), 2.0)])
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::forbidden("User is not a service user"));
    }
}
