use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageResult;

/// A listed object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Blob storage for document contents.
///
/// Constructed once at startup and shared as `Arc<dyn ObjectStore>`.
/// Calls are single attempts; callers decide what a failure means.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Server-side copy of `from` to `to`.
    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Every object whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Time-limited URL granting read access to `key`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Cheap reachability check for the health endpoint.
    async fn check(&self) -> StorageResult<()>;
}
