// # Configuration Client Traits
//
// Defines the interface to the control plane holding configuration objects.
//
// ## Two views
//
// - `ConfigClient`: synchronous remote calls, always current, may fail
// - `ConfigCache`: local eventually consistent view, populated by the
//   collaborator in response to its own calls and watches
//
// The synchronizer diffs against the cache and only goes to the client for
// mutations and for the re-fetch preceding an update.
//
// ## Usage
//
// ```rust,ignore
// use meshsync_core::traits::{ConfigCache, ConfigClient};
//
// async fn refresh(client: &dyn ConfigClient, cache: &dyn ConfigCache) -> meshsync_core::Result<()> {
//     for entry in cache.list_by_prefix("consul-").await? {
//         let latest = client.get(entry.name()).await?;
//         println!("{} at version {:?}", latest.name(), latest.metadata.resource_version);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::ServiceEntry;

/// Trait for control-plane client implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Error Contract
///
/// - `get` on a missing object returns `Error::NotFound`
/// - `create` on an existing name returns `Error::AlreadyExists`
/// - `update` carrying a stale `resource_version` returns `Error::Conflict`
///
/// Implementations must not retry. A failed call is retried implicitly by the
/// next synchronizer cycle.
#[async_trait]
pub trait ConfigClient: Send + Sync {
    /// Fetch the latest version of an object, bypassing any cache
    async fn get(&self, name: &str) -> Result<ServiceEntry, crate::Error>;

    /// Create an object, returning the stored version
    async fn create(&self, entry: &ServiceEntry) -> Result<ServiceEntry, crate::Error>;

    /// Replace an object, returning the stored version
    ///
    /// `entry.metadata.resource_version` is the concurrency token.
    async fn update(&self, entry: &ServiceEntry) -> Result<ServiceEntry, crate::Error>;

    /// Delete an object by name
    async fn delete(&self, name: &str) -> Result<(), crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}

/// Trait for the local configuration-object cache
///
/// The cache may lag behind the control plane. Staleness is tolerated: the
/// synchronizer re-fetches through [`ConfigClient::get`] before updating.
#[async_trait]
pub trait ConfigCache: Send + Sync {
    /// All cached objects whose name starts with `prefix`
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ServiceEntry>, crate::Error>;

    /// Cached object by name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(entry))`: Cached object
    /// - `Ok(None)`: Not in the cache
    /// - `Err(Error)`: Cache unavailable
    async fn get_by_name(&self, name: &str) -> Result<Option<ServiceEntry>, crate::Error>;
}
