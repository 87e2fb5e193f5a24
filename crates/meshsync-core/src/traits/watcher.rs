// # Watcher Trait
//
// Defines the interface for registry pollers.
//
// ## Implementations
//
// - Consul catalog: `meshsync-consul` crate
// - AWS Cloud Map: `meshsync-cloudmap` crate
//
// ## Capabilities
//
// A watcher is the closed set {run, store, prefix}: it periodically refreshes
// its own Store and names the prefix that marks the objects it owns. The
// synchronizer iterates a fixed list of watchers and never inspects their
// concrete type.
//
// ## Usage
//
// ```rust,ignore
// use meshsync_core::traits::Watcher;
//
// let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
// let handle = tokio::spawn({
//     let watcher = watcher.clone();
//     async move { watcher.run(shutdown_rx).await }
// });
//
// // later
// shutdown_tx.send(true)?;
// handle.await?;
// ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::model::Snapshot;
use crate::store::Store;

/// Shared cancellation signal; `true` means stop
pub type ShutdownSignal = watch::Receiver<bool>;

/// Resolve once the shutdown signal is raised or its sender is gone
pub async fn wait_for_shutdown(shutdown: &mut ShutdownSignal) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Result of one poll against a registry backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fresh full membership
    Updated(Snapshot),
    /// Backend reported no progress since the last poll
    Unchanged,
    /// Poll failed; the previous snapshot stays in place
    Failed(String),
}

/// Trait for registry watcher implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe. `run` executes on its own task while
/// the synchronizer reads `store()` from another.
///
/// # Responsibilities
///
/// - ✅ Speak the backend's wire protocol
/// - ✅ Normalize native records into `AddressRecord`s
/// - ✅ Report progress as a [`PollOutcome`]
/// - ❌ Touch configuration objects (owned by `Synchronizer`)
/// - ❌ Write any Store but its own
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Backend name (for logging/debugging)
    fn name(&self) -> &str;

    /// Prefix of every object name this backend owns (e.g. "consul-")
    fn prefix(&self) -> &str;

    /// The Store this watcher publishes into
    fn store(&self) -> &Store;

    /// Interval between polls
    fn poll_interval(&self) -> Duration;

    /// Fetch the backend's current membership once
    async fn poll(&self) -> PollOutcome;

    /// Poll once and publish the result
    ///
    /// Returns `true` when the Store was replaced.
    async fn refresh(&self) -> bool {
        match self.poll().await {
            PollOutcome::Updated(snapshot) => {
                debug!("{}: publishing {} host(s)", self.name(), snapshot.len());
                self.store().set(snapshot);
                true
            }
            PollOutcome::Unchanged => {
                debug!("{}: no change since last poll", self.name());
                false
            }
            PollOutcome::Failed(reason) => {
                warn!("{}: refresh failed, keeping previous snapshot: {}", self.name(), reason);
                false
            }
        }
    }

    /// Refresh immediately, then on every tick until shutdown
    async fn run(&self, mut shutdown: ShutdownSignal) {
        info!(
            "Starting {} watcher (interval={:?})",
            self.name(),
            self.poll_interval()
        );

        let period = self.poll_interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }

                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("{} watcher stopped", self.name());
                    return;
                }
            }
        }
    }
}

/// Helper trait for constructing watchers from configuration
pub trait WatcherFactory: Send + Sync {
    /// Create a Watcher publishing into `store`
    ///
    /// # Returns
    ///
    /// A shared Watcher trait object
    fn create(
        &self,
        config: &BackendConfig,
        store: Arc<Store>,
    ) -> Result<Arc<dyn Watcher>, crate::Error>;
}
