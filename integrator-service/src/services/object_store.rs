use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
}

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                ObjectStoreError::Request(format!("S3 upload failed: {}", DisplayErrorContext(e)))
            })?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() || e.raw().status().as_u16() == 404 => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(ObjectStoreError::Request(format!(
                    "S3 download failed: {}",
                    DisplayErrorContext(e)
                )));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Request(format!("S3 body collection failed: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }
}

/// Bucket kept in memory; used by tests and local runs.
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn keys(&self) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .map_err(|e| ObjectStoreError::Request(format!("Mock bucket mutex poisoned: {}", e)))?
            .keys()
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|e| ObjectStoreError::Request(format!("Mock bucket mutex poisoned: {}", e)))?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|e| ObjectStoreError::Request(format!("Mock bucket mutex poisoned: {}", e)))?
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }
}
