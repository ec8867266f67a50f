//! Owner -> member list resolution.
//!
//! Query the adjacency rows under an owner, keep the active ones, then
//! batch-fetch the member entities. Results follow adjacency (sort-key) order.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;

use crate::models::{Entity, Integrator, MemberKind};

use super::database::Database;
use super::error::ServiceError;

/// Integrators of one group, serialized as `{"<groupID>": [...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupIntegrators {
    pub group_id: String,
    pub integrators: Vec<Integrator>,
}

impl Serialize for GroupIntegrators {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.group_id, &self.integrators)?;
        map.end()
    }
}

#[derive(Clone)]
pub struct Resolver {
    db: Database,
}

impl Resolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Members of `kind` under `owner_id`. An owner without any adjacency row of
    /// that kind is an error, not an empty list. Soft-deleted rows still count as
    /// rows, so an owner whose members are all deleted gets an empty list.
    pub async fn members<E: Entity>(&self, owner_id: &str, kind: MemberKind) -> Result<Vec<E>, ServiceError> {
        self.resolve(owner_id, kind, true).await
    }

    /// Like [`Resolver::members`], but an owner without rows yields an empty list.
    pub async fn members_or_empty<E: Entity>(
        &self,
        owner_id: &str,
        kind: MemberKind,
    ) -> Result<Vec<E>, ServiceError> {
        self.resolve(owner_id, kind, false).await
    }

    /// Ids of the active members of `kind` under `owner_id`.
    pub async fn member_ids(&self, owner_id: &str, kind: MemberKind) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .db
            .relations(owner_id, kind)
            .await?
            .into_iter()
            .filter(|relation| relation.is_active())
            .map(|relation| relation.member_id)
            .collect())
    }

    async fn resolve<E: Entity>(
        &self,
        owner_id: &str,
        kind: MemberKind,
        strict: bool,
    ) -> Result<Vec<E>, ServiceError> {
        debug_assert_eq!(E::SORT_KEY, kind.entity_sort_key());

        let relations = self.db.relations(owner_id, kind).await?;
        if relations.is_empty() && strict {
            return Err(ServiceError::internal("No result.Items"));
        }

        let ids: Vec<String> = relations
            .into_iter()
            .filter(|relation| relation.is_active())
            .map(|relation| relation.member_id)
            .collect();

        self.db.batch_get_entities(&ids).await
    }

    /// Integrators of each requested group, one entry per group in request order.
    ///
    /// Every group must be an active group membership of `owner_id`; the first
    /// one that is not fails the whole call.
    pub async fn integrators_from_groups(
        &self,
        owner_id: &str,
        group_ids: &[String],
    ) -> Result<Vec<GroupIntegrators>, ServiceError> {
        let memberships: HashSet<String> = self
            .member_ids(owner_id, MemberKind::Group)
            .await?
            .into_iter()
            .collect();

        if let Some(missing) = group_ids.iter().find(|id| !memberships.contains(*id)) {
            return Err(ServiceError::validation(format!("User not in group: {}", missing)));
        }

        let mut result = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            let integrators = self
                .members_or_empty::<Integrator>(group_id, MemberKind::Integrator)
                .await?;
            result.push(GroupIntegrators {
                group_id: group_id.clone(),
                integrators,
            });
        }

        Ok(result)
    }
}
