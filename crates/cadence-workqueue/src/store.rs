//! In-memory schedule store.

use std::collections::HashMap;

use async_trait::async_trait;
use cadence_protocols::{ScheduleStore, StoreError};
use tokio::sync::RwLock;
use tracing::debug;

/// Hash-of-hashes kept in process memory.
pub struct MemoryScheduleStore {
    namespaces: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Number of fields stored in `ns`.
    pub async fn len(&self, ns: &str) -> usize {
        self.namespaces.read().await.get(ns).map_or(0, HashMap::len)
    }
}

impl Default for MemoryScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn hash_set(&self, ns: &str, field: &str, value: String) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(ns.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_get(&self, ns: &str, field: &str) -> Result<Option<String>, StoreError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(ns).and_then(|fields| fields.get(field)).cloned())
    }

    async fn hash_get_all(&self, ns: &str) -> Result<HashMap<String, String>, StoreError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(ns).cloned().unwrap_or_default())
    }

    async fn hash_delete(&self, ns: &str, field: &str) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(fields) = namespaces.get_mut(ns) {
            fields.remove(field);
            if fields.is_empty() {
                namespaces.remove(ns);
            }
        }
        Ok(())
    }

    /// Applied under a single write lock, so readers see all or none.
    async fn hash_set_many(&self, ns: &str, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut namespaces = self.namespaces.write().await;
        let fields = namespaces.entry(ns.to_string()).or_default();
        debug!(ns = %ns, count = entries.len(), "Batched hash write");
        fields.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
