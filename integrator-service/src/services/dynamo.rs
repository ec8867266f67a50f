//! DynamoDB-backed [`RelationStore`].

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes, PutRequest, ReturnValue, WriteRequest};
use aws_sdk_dynamodb::Client;
use serde_json::Value;
use std::collections::HashMap;

use super::store::{Item, ItemKey, RelationStore, SortKeyCondition, StoreError, PARTITION_KEY, SORT_KEY};

/// BatchGetItem accepts at most 100 keys per call.
const BATCH_GET_LIMIT: usize = 100;
/// BatchWriteItem accepts at most 25 requests per call.
const BATCH_WRITE_LIMIT: usize = 25;

type DynamoItem = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct DynamoRelationStore {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoRelationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoRelationStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoRelationStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn key(key: &ItemKey) -> DynamoItem {
        HashMap::from([
            (PARTITION_KEY.to_string(), AttributeValue::S(key.pk.clone())),
            (SORT_KEY.to_string(), AttributeValue::S(key.sk.clone())),
        ])
    }
}

fn request_failed(operation: &str, err: impl std::error::Error) -> StoreError {
    StoreError::Request(format!(
        "DynamoDB {} failed: {}",
        operation,
        DisplayErrorContext(err)
    ))
}

pub(crate) fn to_dynamo_item(item: &Item) -> DynamoItem {
    item.iter()
        .filter_map(|(k, v)| to_attribute(v).map(|attr| (k.clone(), attr)))
        .collect()
}

pub(crate) fn from_dynamo_item(item: &DynamoItem) -> Item {
    item.iter()
        .filter_map(|(k, v)| from_attribute(v).map(|value| (k.clone(), value)))
        .collect()
}

fn to_attribute(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::Null => Some(AttributeValue::Null(true)),
        Value::Bool(b) => Some(AttributeValue::Bool(*b)),
        Value::Number(n) => Some(AttributeValue::N(n.to_string())),
        Value::String(s) => Some(AttributeValue::S(s.clone())),
        Value::Array(values) => Some(AttributeValue::L(
            values.iter().filter_map(to_attribute).collect(),
        )),
        Value::Object(map) => Some(AttributeValue::M(
            map.iter()
                .filter_map(|(k, v)| to_attribute(v).map(|attr| (k.clone(), attr)))
                .collect(),
        )),
    }
}

fn from_attribute(attr: &AttributeValue) -> Option<Value> {
    match attr {
        AttributeValue::S(s) => Some(Value::String(s.clone())),
        AttributeValue::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                Some(Value::Number(i.into()))
            } else {
                n.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }
        }
        AttributeValue::Bool(b) => Some(Value::Bool(*b)),
        AttributeValue::Null(_) => Some(Value::Null),
        AttributeValue::L(values) => Some(Value::Array(
            values.iter().filter_map(from_attribute).collect(),
        )),
        AttributeValue::M(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(k, v)| from_attribute(v).map(|value| (k.clone(), value)))
                .collect(),
        )),
        // binary and set types never appear in this table
        _ => None,
    }
}

#[async_trait]
impl RelationStore for DynamoRelationStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(key)))
            .send()
            .await
            .map_err(|e| request_failed("GetItem", e))?;

        Ok(output.item.as_ref().map(from_dynamo_item))
    }

    async fn query(&self, pk: &str, condition: SortKeyCondition) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .set_exclusive_start_key(exclusive_start_key.take());

            request = match &condition {
                SortKeyCondition::BeginsWith(prefix) => request
                    .key_condition_expression("PK = :pk AND begins_with(SK, :sk)")
                    .expression_attribute_values(":sk", AttributeValue::S(prefix.clone())),
                SortKeyCondition::Between(start, end) => request
                    .key_condition_expression("PK = :pk AND SK BETWEEN :start AND :end")
                    .expression_attribute_values(":start", AttributeValue::S(start.clone()))
                    .expression_attribute_values(":end", AttributeValue::S(end.clone())),
            };

            let output = request.send().await.map_err(|e| request_failed("Query", e))?;

            items.extend(output.items().iter().map(from_dynamo_item));

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn batch_get(&self, keys: Vec<ItemKey>) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(BATCH_GET_LIMIT) {
            let request = KeysAndAttributes::builder()
                .set_keys(Some(chunk.iter().map(Self::key).collect()))
                .build()
                .map_err(|e| StoreError::Request(format!("Invalid BatchGetItem request: {}", e)))?;

            let output = self
                .client
                .batch_get_item()
                .request_items(&self.table_name, request)
                .send()
                .await
                .map_err(|e| request_failed("BatchGetItem", e))?;

            let unprocessed = output
                .unprocessed_keys
                .as_ref()
                .and_then(|pending| pending.get(&self.table_name))
                .map(|pending| pending.keys().len())
                .unwrap_or(0);
            if unprocessed > 0 {
                return Err(StoreError::Request(format!(
                    "BatchGetItem left {} keys unprocessed",
                    unprocessed
                )));
            }

            if let Some(found) = output
                .responses
                .as_ref()
                .and_then(|responses| responses.get(&self.table_name))
            {
                items.extend(found.iter().map(from_dynamo_item));
            }
        }

        Ok(items)
    }

    async fn put_item(&self, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_dynamo_item(&item)))
            .send()
            .await
            .map_err(|e| request_failed("PutItem", e))?;
        Ok(())
    }

    async fn update_item(&self, key: &ItemKey, attributes: Item) -> Result<Item, StoreError> {
        if attributes.is_empty() {
            return Err(StoreError::Request("UpdateItem needs at least one attribute".to_string()));
        }

        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(key)))
            .return_values(ReturnValue::AllNew);

        let mut assignments = Vec::with_capacity(attributes.len());
        for (index, (name, value)) in attributes.iter().enumerate() {
            let Some(attr) = to_attribute(value) else {
                continue;
            };
            assignments.push(format!("#a{index} = :v{index}"));
            request = request
                .expression_attribute_names(format!("#a{index}"), name)
                .expression_attribute_values(format!(":v{index}"), attr);
        }

        let output = request
            .update_expression(format!("SET {}", assignments.join(", ")))
            .send()
            .await
            .map_err(|e| request_failed("UpdateItem", e))?;

        output
            .attributes
            .as_ref()
            .map(from_dynamo_item)
            .ok_or_else(|| StoreError::Malformed(format!("UpdateItem returned no attributes for {}", key)))
    }

    async fn batch_write(&self, items: Vec<Item>) -> Result<(), StoreError> {
        for chunk in items.chunks(BATCH_WRITE_LIMIT) {
            let requests = chunk
                .iter()
                .map(|item| {
                    PutRequest::builder()
                        .set_item(Some(to_dynamo_item(item)))
                        .build()
                        .map(|put| WriteRequest::builder().put_request(put).build())
                        .map_err(|e| StoreError::Request(format!("Invalid PutRequest: {}", e)))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let output = self
                .client
                .batch_write_item()
                .request_items(&self.table_name, requests)
                .send()
                .await
                .map_err(|e| request_failed("BatchWriteItem", e))?;

            let unprocessed = output
                .unprocessed_items
                .as_ref()
                .and_then(|pending| pending.get(&self.table_name))
                .map(Vec::len)
                .unwrap_or(0);
            if unprocessed > 0 {
                return Err(StoreError::Request(format!(
                    "BatchWriteItem left {} items unprocessed",
                    unprocessed
                )));
            }
        }

        Ok(())
    }
}
