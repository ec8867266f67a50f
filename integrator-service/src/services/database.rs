//! Typed access to the single table.
//!
//! Wraps a [`RelationStore`] and handles the row shapes: entity rows keyed by
//! `(id, <type marker>)`, adjacency rows keyed by `(owner, <kind>#<member>)`,
//! usage entries and report pointers.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::ServiceError;
use super::store::{Item, ItemKey, RelationStore, SortKeyCondition, StoreError, SORT_KEY};
use crate::models::{Entity, MemberKind, Relation, ReportPointer, UsageEntry, User};

#[derive(Clone)]
pub struct Database {
    store: Arc<dyn RelationStore>,
}

fn to_item<T: Serialize>(value: &T) -> Result<Item, StoreError> {
    match serde_json::to_value(value).map_err(|e| StoreError::Malformed(e.to_string()))? {
        Value::Object(item) => Ok(item),
        other => Err(StoreError::Malformed(format!("expected an object, got {}", other))),
    }
}

fn from_item<T: DeserializeOwned>(item: Item) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(item)).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn entity_item<E: Entity>(entity: &E) -> Result<Item, StoreError> {
    let mut item = to_item(entity)?;
    item.insert(SORT_KEY.to_string(), Value::String(E::SORT_KEY.to_string()));
    Ok(item)
}

impl Database {
    pub fn new(store: Arc<dyn RelationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RelationStore> {
        &self.store
    }

    // ==================== Entity Operations ====================

    pub async fn find_entity<E: Entity>(&self, id: &str) -> Result<Option<E>, ServiceError> {
        let item = self.store.get_item(&ItemKey::new(id, E::SORT_KEY)).await?;
        Ok(item.map(from_item).transpose()?)
    }

    /// Loads a user row; a missing row is `NotFound`.
    pub async fn get_user(&self, user_id: &str) -> Result<User, ServiceError> {
        self.find_entity::<User>(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User not found: {}", user_id)))
    }

    pub async fn put_entity<E: Entity>(&self, entity: &E) -> Result<(), ServiceError> {
        self.store.put_item(entity_item(entity)?).await?;
        Ok(())
    }

    /// Fetches entities by id, returned in the order of `ids`. Ids without a row are skipped.
    pub async fn batch_get_entities<E: Entity>(&self, ids: &[String]) -> Result<Vec<E>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys = ids
            .iter()
            .map(|id| ItemKey::new(id.clone(), E::SORT_KEY))
            .collect();
        let mut found: HashMap<String, E> = HashMap::new();
        for item in self.store.batch_get(keys).await? {
            let entity: E = from_item(item)?;
            found.insert(entity.id().to_string(), entity);
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    /// Sets attributes on an entity row and returns the updated entity.
    pub async fn update_entity<E: Entity>(&self, id: &str, attributes: Item) -> Result<E, ServiceError> {
        let item = self
            .store
            .update_item(&ItemKey::new(id, E::SORT_KEY), attributes)
            .await?;
        Ok(from_item(item)?)
    }

    pub async fn set_entity_deleted<E: Entity>(&self, id: &str, is_deleted: bool) -> Result<E, ServiceError> {
        let mut attributes = Item::new();
        attributes.insert("isDeleted".to_string(), Value::Bool(is_deleted));
        self.update_entity(id, attributes).await
    }

    /// Writes the entity row and the owner's adjacency row in one batch.
    ///
    /// The batch is not transactional: a partial failure can leave either row behind.
    pub async fn create_owned<E: Entity>(
        &self,
        entity: &E,
        owner_id: &str,
        kind: MemberKind,
    ) -> Result<(), ServiceError> {
        let relation = Relation::new(owner_id, kind, entity.id());
        self.store
            .batch_write(vec![entity_item(entity)?, to_item(&relation)?])
            .await?;
        Ok(())
    }

    // ==================== Relation Operations ====================

    pub async fn find_relation(
        &self,
        owner_id: &str,
        kind: MemberKind,
        member_id: &str,
    ) -> Result<Option<Relation>, ServiceError> {
        let item = self
            .store
            .get_item(&ItemKey::new(owner_id, kind.sort_key(member_id)))
            .await?;
        Ok(item.map(from_item).transpose()?)
    }

    /// Adjacency rows of one kind under `owner_id`, soft-deleted ones included, in sort-key order.
    pub async fn relations(&self, owner_id: &str, kind: MemberKind) -> Result<Vec<Relation>, ServiceError> {
        let rows = self
            .store
            .query(owner_id, SortKeyCondition::BeginsWith(kind.prefix().to_string()))
            .await?;
        Ok(rows
            .into_iter()
            .map(from_item)
            .collect::<Result<Vec<Relation>, _>>()?)
    }

    pub async fn put_relation(&self, relation: &Relation) -> Result<(), ServiceError> {
        self.store.put_item(to_item(relation)?).await?;
        Ok(())
    }

    pub async fn set_relation_deleted(
        &self,
        owner_id: &str,
        kind: MemberKind,
        member_id: &str,
        is_deleted: bool,
    ) -> Result<Relation, ServiceError> {
        let mut attributes = Item::new();
        attributes.insert("isDeleted".to_string(), Value::Bool(is_deleted));
        let item = self
            .store
            .update_item(&ItemKey::new(owner_id, kind.sort_key(member_id)), attributes)
            .await?;
        Ok(from_item(item)?)
    }

    // ==================== Usage Entry Operations ====================

    pub async fn put_entries(&self, entries: &[UsageEntry]) -> Result<(), ServiceError> {
        let items = entries.iter().map(to_item).collect::<Result<Vec<_>, _>>()?;
        self.store.batch_write(items).await?;
        Ok(())
    }

    /// Usage entries of an integrator with a sort key in `[range_start, range_end]`.
    /// The integrator's own row in the same partition is skipped.
    pub async fn entries_between(
        &self,
        integrator_id: &str,
        range_start: &str,
        range_end: &str,
    ) -> Result<Vec<UsageEntry>, ServiceError> {
        let rows = self
            .store
            .query(
                integrator_id,
                SortKeyCondition::Between(range_start.to_string(), range_end.to_string()),
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.get(SORT_KEY)
                    .and_then(Value::as_str)
                    .is_some_and(|sk| !UsageEntry::is_reserved_key(sk))
            })
            .map(from_item)
            .collect::<Result<Vec<UsageEntry>, _>>()?)
    }

    // ==================== Report Operations ====================

    pub async fn put_report_pointer(&self, pointer: &ReportPointer) -> Result<(), ServiceError> {
        self.store.put_item(to_item(pointer)?).await?;
        Ok(())
    }

    pub async fn report_pointers(&self, requester_id: &str) -> Result<Vec<ReportPointer>, ServiceError> {
        let rows = self
            .store
            .query(
                requester_id,
                SortKeyCondition::BeginsWith(ReportPointer::PREFIX.to_string()),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(from_item)
            .collect::<Result<Vec<ReportPointer>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Integrator, UserRole};
    use crate::services::InMemoryRelationStore;

    fn database() -> (Arc<InMemoryRelationStore>, Database) {
        let store = Arc::new(InMemoryRelationStore::new());
        (store.clone(), Database::new(store))
    }

    #[tokio::test]
    async fn create_owned_writes_entity_and_adjacency_rows() {
        let (store, db) = database();
        let integrator = Integrator::new("i1", "Hall A", "SN-1");

        db.create_owned(&integrator, "m1", MemberKind::Integrator).await.unwrap();

        assert_eq!(db.find_entity::<Integrator>("i1").await.unwrap(), Some(integrator));
        assert!(db
            .find_relation("m1", MemberKind::Integrator, "i1")
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.batch_write_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_get_follows_requested_order_and_skips_missing() {
        let (_, db) = database();
        for id in ["a", "b", "c"] {
            db.put_entity(&User::new(id, UserRole::WORKER, vec![])).await.unwrap();
        }

        let ids = vec!["c".to_string(), "zz".to_string(), "a".to_string()];
        let users: Vec<User> = db.batch_get_entities(&ids).await.unwrap();
        let got: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(got, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (_, db) = database();
        let err = db.get_user("ghost").await.unwrap_err();
        assert_eq!(err, ServiceError::not_found("User not found: ghost"));
    }
}
