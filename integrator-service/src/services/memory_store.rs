use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::store::{Item, ItemKey, RelationStore, SortKeyCondition, StoreError};

/// In-process table used by tests and local runs.
///
/// Keys are kept in a `BTreeMap`, so partition scans come back in sort-key
/// order the same way the managed store returns them.
pub struct InMemoryRelationStore {
    items: Mutex<BTreeMap<(String, String), Item>>,
    failing_partitions: Mutex<HashSet<String>>,
    batch_writes: Mutex<usize>,
}

impl Default for InMemoryRelationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRelationStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            failing_partitions: Mutex::new(HashSet::new()),
            batch_writes: Mutex::new(0),
        }
    }

    /// Makes every query against `pk` fail.
    pub fn fail_queries_for(&self, pk: &str) -> Result<(), StoreError> {
        self.failing_partitions
            .lock()
            .map_err(poisoned)?
            .insert(pk.to_string());
        Ok(())
    }

    pub fn batch_write_count(&self) -> Result<usize, StoreError> {
        Ok(*self.batch_writes.lock().map_err(poisoned)?)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.items.lock().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn insert(&self, item: Item) -> Result<(), StoreError> {
        let key = ItemKey::of(&item)?;
        self.items
            .lock()
            .map_err(poisoned)?
            .insert((key.pk, key.sk), item);
        Ok(())
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Request(format!("In-memory store mutex poisoned: {}", e))
}

#[async_trait]
impl RelationStore for InMemoryRelationStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        let items = self.items.lock().map_err(poisoned)?;
        Ok(items.get(&(key.pk.clone(), key.sk.clone())).cloned())
    }

    async fn query(&self, pk: &str, condition: SortKeyCondition) -> Result<Vec<Item>, StoreError> {
        if self.failing_partitions.lock().map_err(poisoned)?.contains(pk) {
            return Err(StoreError::Request(format!("Query failed for partition {}", pk)));
        }

        let items = self.items.lock().map_err(poisoned)?;
        let lower = (pk.to_string(), String::new());
        Ok(items
            .range(lower..)
            .take_while(|((item_pk, _), _)| item_pk == pk)
            .filter(|((_, sk), _)| condition.matches(sk))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn batch_get(&self, keys: Vec<ItemKey>) -> Result<Vec<Item>, StoreError> {
        let items = self.items.lock().map_err(poisoned)?;
        Ok(keys
            .into_iter()
            .filter_map(|key| items.get(&(key.pk, key.sk)).cloned())
            .collect())
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.insert(item)
    }

    async fn update_item(&self, key: &ItemKey, attributes: Item) -> Result<Item, StoreError> {
        let mut items = self.items.lock().map_err(poisoned)?;
        let entry = items
            .entry((key.pk.clone(), key.sk.clone()))
            .or_insert_with(|| {
                let mut item = Item::new();
                item.insert("PK".to_string(), key.pk.clone().into());
                item.insert("SK".to_string(), key.sk.clone().into());
                item
            });
        entry.extend(attributes);
        Ok(entry.clone())
    }

    async fn batch_write(&self, items: Vec<Item>) -> Result<(), StoreError> {
        *self.batch_writes.lock().map_err(poisoned)? += 1;
        for item in items {
            self.insert(item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn query_is_scoped_to_partition_and_sorted() {
        let store = InMemoryRelationStore::new();
        for (pk, sk) in [("m1", "user#b"), ("m1", "user#a"), ("m10", "user#c"), ("m1", "user")] {
            store.put_item(item(json!({ "PK": pk, "SK": sk }))).await.unwrap();
        }

        let rows = store
            .query("m1", SortKeyCondition::BeginsWith("user#".into()))
            .await
            .unwrap();
        let sks: Vec<_> = rows.iter().map(|r| r["SK"].as_str().unwrap()).collect();
        assert_eq!(sks, vec!["user#a", "user#b"]);
    }

    #[tokio::test]
    async fn update_merges_attributes_and_upserts() {
        let store = InMemoryRelationStore::new();
        store
            .put_item(item(json!({ "PK": "g1", "SK": "group", "integratorGroupName": "A" })))
            .await
            .unwrap();

        let updated = store
            .update_item(&ItemKey::new("g1", "group"), item(json!({ "isDeleted": true })))
            .await
            .unwrap();
        assert_eq!(updated["integratorGroupName"], "A");
        assert_eq!(updated["isDeleted"], true);

        let created = store
            .update_item(&ItemKey::new("u1", "group#g1"), item(json!({ "isDeleted": false })))
            .await
            .unwrap();
        assert_eq!(created["PK"], "u1");
    }

    #[tokio::test]
    async fn injected_failures_only_hit_queries() {
        let store = InMemoryRelationStore::new();
        store.fail_queries_for("i1").unwrap();
        assert!(store
            .query("i1", SortKeyCondition::BeginsWith(String::new()))
            .await
            .is_err());
        assert!(store.get_item(&ItemKey::new("i1", "integrator")).await.unwrap().is_none());
    }
}
