//! Schedule store protocol.
//!
//! The store is a shared hash-of-hashes: a namespace (the hash) holds one
//! field per task identity whose value is the serialized definition.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Set one field inside a namespace.
    async fn hash_set(&self, ns: &str, field: &str, value: String) -> Result<(), StoreError>;

    /// Read one field. `None` when the field does not exist.
    async fn hash_get(&self, ns: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Read every field of a namespace.
    async fn hash_get_all(&self, ns: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Delete one field. Deleting a missing field is not an error.
    async fn hash_delete(&self, ns: &str, field: &str) -> Result<(), StoreError>;

    /// Write several fields in one round-trip.
    async fn hash_set_many(&self, ns: &str, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        for (field, value) in entries {
            self.hash_set(ns, &field, value).await?;
        }
        Ok(())
    }
}
