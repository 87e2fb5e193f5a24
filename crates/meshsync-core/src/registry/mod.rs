//! Plugin-based watcher registry
//!
//! The registry allows registry-backend watchers to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meshsync_core::registry::WatcherRegistry;
//! use meshsync_core::config::BackendConfig;
//! use meshsync_core::Store;
//! use std::sync::Arc;
//!
//! let registry = WatcherRegistry::new();
//! meshsync_consul::register(&registry);
//!
//! let config = BackendConfig::consul("http://127.0.0.1:8500");
//! let watcher = registry.create_watcher(&config, Arc::new(Store::new()))?;
//! ```

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::traits::{Watcher, WatcherFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Watcher registry for plugin-based backend creation
///
/// The registry maintains a map of backend type names to factory objects,
/// allowing dynamic instantiation of watchers based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct WatcherRegistry {
    factories: RwLock<HashMap<String, Arc<dyn WatcherFactory>>>,
}

impl WatcherRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher factory
    ///
    /// # Parameters
    ///
    /// - `name`: Backend type name (e.g., "consul", "cloudmap")
    /// - `factory`: Factory object for creating watcher instances
    pub fn register_watcher(&self, name: impl Into<String>, factory: Box<dyn WatcherFactory>) {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        factories.insert(name.into(), Arc::from(factory));
    }

    /// Create a watcher from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn Watcher>)`: Created watcher publishing into `store`
    /// - `Err(Error)`: If the backend type is not registered or creation fails
    pub fn create_watcher(
        &self,
        config: &BackendConfig,
        store: Arc<Store>,
    ) -> Result<Arc<dyn Watcher>> {
        let backend_type = config.type_name();

        let factory = {
            let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
            factories
                .get(backend_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown backend type: {}", backend_type)))?
        };

        factory.create(config, store)
    }

    /// List all registered backend types
    pub fn list_watchers(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.keys().cloned().collect()
    }

    /// Check if a backend type is registered
    pub fn has_watcher(&self, name: &str) -> bool {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.contains_key(name)
    }
}
