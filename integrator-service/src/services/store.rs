//! Single-table key-value capability.
//!
//! Items are JSON objects carrying a string `PK` and `SK`. Implementations
//! give single-item atomicity only; batches may partially apply.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub type Item = Map<String, Value>;

pub const PARTITION_KEY: &str = "PK";
pub const SORT_KEY: &str = "SK";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    pub fn of(item: &Item) -> Result<Self, StoreError> {
        let field = |name: &str| {
            item.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StoreError::Malformed(format!("item has no string {}", name)))
        };
        Ok(Self {
            pk: field(PARTITION_KEY)?,
            sk: field(SORT_KEY)?,
        })
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pk, self.sk)
    }
}

/// Sort-key condition of a partition query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    BeginsWith(String),
    /// Inclusive on both ends, lexicographic.
    Between(String, String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortKeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortKeyCondition::Between(start, end) => {
                sort_key >= start.as_str() && sort_key <= end.as_str()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Malformed item: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Item>, StoreError>;

    /// Items under `pk` whose sort key satisfies `condition`, in ascending sort-key order.
    async fn query(&self, pk: &str, condition: SortKeyCondition) -> Result<Vec<Item>, StoreError>;

    /// Fetches the items that exist. Order is unspecified; missing keys are skipped.
    async fn batch_get(&self, keys: Vec<ItemKey>) -> Result<Vec<Item>, StoreError>;

    async fn put_item(&self, item: Item) -> Result<(), StoreError>;

    /// Sets `attributes` on the item (creating it if absent) and returns the new image.
    async fn update_item(&self, key: &ItemKey, attributes: Item) -> Result<Item, StoreError>;

    async fn batch_write(&self, items: Vec<Item>) -> Result<(), StoreError>;
}
