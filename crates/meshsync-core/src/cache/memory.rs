// # Memory Config Store
//
// In-memory implementation of both ConfigClient and ConfigCache.
//
// ## Purpose
//
// Provides a control-plane stand-in that behaves like the real thing where
// the synchronizer cares:
// - resource versions increase on every write
// - creating an existing name fails
// - updating with a stale resource version fails
//
// The client and cache views share one map, so the cache is never stale.
//
// ## When to Use
//
// - Testing environments
// - Dry-run deployments (log what would be written)
// - Embedding without a control plane

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::ServiceEntry;
use crate::traits::{ConfigCache, ConfigClient};

/// In-memory configuration store
///
/// # Example
///
/// ```rust,no_run
/// use meshsync_core::cache::MemoryConfigStore;
/// use meshsync_core::traits::{ConfigCache, ConfigClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryConfigStore::new();
///
///     let cached = store.get_by_name("consul-demo.tetrate.io").await?;
///     assert!(cached.is_none());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<BTreeMap<String, ServiceEntry>>>,
    version: Arc<AtomicU64>,
}

impl MemoryConfigStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of objects in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Names of all stored objects, sorted
    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Insert or overwrite an object without version checks
    ///
    /// Simulates writes made by someone other than the synchronizer.
    pub async fn seed(&self, entry: ServiceEntry) -> ServiceEntry {
        let mut guard = self.inner.write().await;
        let stored = self.stamp(entry);
        guard.insert(stored.metadata.name.clone(), stored.clone());
        stored
    }

    fn stamp(&self, mut entry: ServiceEntry) -> ServiceEntry {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        entry.metadata.resource_version = Some(version.to_string());
        entry
    }
}

#[async_trait]
impl ConfigClient for MemoryConfigStore {
    async fn get(&self, name: &str) -> Result<ServiceEntry, Error> {
        let guard = self.inner.read().await;
        guard
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name.to_string()))
    }

    async fn create(&self, entry: &ServiceEntry) -> Result<ServiceEntry, Error> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(entry.name()) {
            return Err(Error::already_exists(entry.name().to_string()));
        }

        let stored = self.stamp(entry.clone());
        guard.insert(stored.metadata.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, entry: &ServiceEntry) -> Result<ServiceEntry, Error> {
        let mut guard = self.inner.write().await;
        let current = guard
            .get(entry.name())
            .ok_or_else(|| Error::not_found(entry.name().to_string()))?;

        if current.metadata.resource_version != entry.metadata.resource_version {
            return Err(Error::conflict(format!(
                "{}: resource version {:?} is stale (current {:?})",
                entry.name(),
                entry.metadata.resource_version,
                current.metadata.resource_version
            )));
        }

        let stored = self.stamp(entry.clone());
        guard.insert(stored.metadata.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(name.to_string()))
    }

    fn client_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ConfigCache for MemoryConfigStore {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ServiceEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .filter(|entry| entry.name().starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ServiceEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(name).cloned())
    }
}
