//! Reconciliation loop
//!
//! The Synchronizer is responsible for:
//! - Reading each backend's Store
//! - Deriving the desired configuration object per host
//! - Diffing against the cached actual object
//! - Issuing create/update/delete through the ConfigClient
//! - Garbage-collecting objects whose host left the backend
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  set   ┌─────────┐
//! │ Watcher A │──────▶│ Store A │──┐
//! └───────────┘        └─────────┘  │ hosts
//! ┌───────────┐  set   ┌─────────┐  │
//! │ Watcher B │──────▶│ Store B │──┤
//! └───────────┘        └─────────┘  ▼
//!                            ┌──────────────┐  list/get  ┌─────────────┐
//!                            │ Synchronizer │───────────▶│ ConfigCache │
//!                            └──────────────┘            └─────────────┘
//!                                   │ get/create/update/delete
//!                                   ▼
//!                            ┌──────────────┐
//!                            │ ConfigClient │
//!                            └──────────────┘
//! ```
//!
//! ## Cycle
//!
//! For each backend, in order:
//! 1. create-or-update every host in the backend's snapshot
//! 2. garbage-collect objects bearing the backend's prefix whose host is gone
//!
//! A failed call is logged and skipped. The next cycle recomputes the desired
//! state from scratch, so there is no retry bookkeeping.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::SynchronizerConfig;
use crate::error::{Error, Result};
use crate::infer;
use crate::model::{AddressRecord, ServiceEntry, Snapshot};
use crate::traits::{ConfigCache, ConfigClient, ShutdownSignal, Watcher, wait_for_shutdown};

/// Client call a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Cache lookup or listing
    Lookup,
    Create,
    /// Re-fetch preceding an update
    Get,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Lookup => "lookup",
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Outcome of reconciling one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created,
    Updated,
    Unchanged,
}

/// Per-cycle tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl CycleReport {
    /// Whether the cycle issued any mutation
    pub fn has_changes(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }

    fn record(&mut self, outcome: Reconciled) {
        match outcome {
            Reconciled::Created => self.created += 1,
            Reconciled::Updated => self.updated += 1,
            Reconciled::Unchanged => self.unchanged += 1,
        }
    }

    fn merge(&mut self, other: CycleReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// Events emitted by the Synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Loop started
    Started { backends: usize },

    /// Object created
    Created { name: String },

    /// Object spec replaced
    Updated { name: String },

    /// Object already matched the registry
    Unchanged { name: String },

    /// Object removed because its host left the backend
    Deleted { name: String },

    /// Client or cache call failed
    OperationFailed {
        name: String,
        operation: Operation,
        error: String,
    },

    /// One full pass over every backend finished
    CycleCompleted { report: CycleReport },

    /// Loop stopped
    Stopped { reason: String },
}

/// Reconciles registry snapshots into configuration objects
///
/// ## Lifecycle
///
/// 1. Create with [`Synchronizer::new()`]
/// 2. Start with [`Synchronizer::run()`]
/// 3. Runs until the shutdown signal is raised
///
/// ## Ownership
///
/// Every backend owns exactly the objects whose name starts with its prefix.
/// Garbage collection for one backend never looks at another's objects, and
/// construction rejects prefixes that overlap.
pub struct Synchronizer {
    client: Arc<dyn ConfigClient>,
    cache: Arc<dyn ConfigCache>,
    watchers: Vec<Arc<dyn Watcher>>,
    interval: Duration,
    namespace: String,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl Synchronizer {
    /// Create a new synchronizer
    ///
    /// # Returns
    ///
    /// A tuple of (synchronizer, event_receiver)
    pub fn new(
        client: Arc<dyn ConfigClient>,
        cache: Arc<dyn ConfigCache>,
        watchers: Vec<Arc<dyn Watcher>>,
        config: SynchronizerConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;
        validate_prefixes(&watchers)?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let synchronizer = Self {
            client,
            cache,
            watchers,
            interval: Duration::from_secs(config.interval_secs),
            namespace: config.namespace,
            event_tx: tx,
        };

        Ok((synchronizer, rx))
    }

    /// Registered backends, in reconciliation order
    pub fn watchers(&self) -> &[Arc<dyn Watcher>] {
        &self.watchers
    }

    /// Run cycles on a fixed interval until shutdown
    ///
    /// The first cycle starts immediately. The shutdown signal is checked
    /// between cycles; a cycle in progress finishes its current call first.
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> Result<()> {
        info!(
            "Starting synchronizer: {} backend(s), interval {:?}, namespace {}",
            self.watchers.len(),
            self.interval,
            self.namespace
        );
        self.emit_event(SyncEvent::Started {
            backends: self.watchers.len(),
        });

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Shutdown signal received");
                    self.emit_event(SyncEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = ticker.tick() => {
                    self.sync_once().await;
                }
            }
        }

        info!("Synchronizer stopped");
        Ok(())
    }

    /// Run one full cycle over every backend
    pub async fn sync_once(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for watcher in &self.watchers {
            report.merge(self.sync_backend(watcher.as_ref()).await);
        }

        if report.has_changes() || report.failed > 0 {
            info!(
                "Sync cycle complete: {} created, {} updated, {} deleted, {} unchanged, {} failed",
                report.created, report.updated, report.deleted, report.unchanged, report.failed
            );
        } else {
            debug!("Sync cycle complete: {} object(s) unchanged", report.unchanged);
        }

        self.emit_event(SyncEvent::CycleCompleted { report });
        report
    }

    /// Create-or-update every host of one backend, then garbage-collect it
    async fn sync_backend(&self, watcher: &dyn Watcher) -> CycleReport {
        let mut report = CycleReport::default();
        let hosts = watcher.store().hosts();

        let mut names: Vec<&String> = hosts.keys().collect();
        names.sort();

        for host in names {
            match self.create_or_update(watcher, host, &hosts[host]).await {
                Ok(outcome) => report.record(outcome),
                Err(_) => report.failed += 1,
            }
        }

        match self.collect_garbage(watcher, &hosts).await {
            Ok(gc) => report.merge(gc),
            Err(e) => {
                error!(
                    "{}: garbage collection skipped, listing {}* failed: {}",
                    watcher.name(),
                    watcher.prefix(),
                    e
                );
                report.failed += 1;
            }
        }

        report
    }

    /// Reconcile one host of one backend
    ///
    /// - not cached → create
    /// - cached and mesh-equivalent → no-op
    /// - cached and different → re-fetch, replace spec, update
    ///   (a re-fetch that finds nothing creates instead)
    ///
    /// Failures are logged and reported as events before being returned.
    pub async fn create_or_update(
        &self,
        watcher: &dyn Watcher,
        host: &str,
        records: &[AddressRecord],
    ) -> Result<Reconciled> {
        let desired = infer::desired_service_entry(
            watcher.prefix(),
            &self.namespace,
            watcher.name(),
            host,
            records,
        );
        let name = desired.name().to_string();

        let cached = self
            .cache
            .get_by_name(&name)
            .await
            .map_err(|e| self.failed(&name, Operation::Lookup, e))?;

        let Some(actual) = cached else {
            return self.create(&desired).await;
        };

        if actual.spec.mesh_equivalent(&desired.spec) {
            debug!("{} is up to date", name);
            self.emit_event(SyncEvent::Unchanged { name });
            return Ok(Reconciled::Unchanged);
        }

        let mut latest = match self.client.get(&name).await {
            Ok(latest) => latest,
            Err(e) if e.is_not_found() => {
                debug!("{} vanished before update, creating instead", name);
                return self.create(&desired).await;
            }
            Err(e) => return Err(self.failed(&name, Operation::Get, e)),
        };

        latest.spec = desired.spec;
        self.client
            .update(&latest)
            .await
            .map_err(|e| self.failed(&name, Operation::Update, e))?;

        info!("Updated {} ({} endpoint(s))", name, records.len());
        self.emit_event(SyncEvent::Updated { name });
        Ok(Reconciled::Updated)
    }

    /// Delete objects owned by `watcher` whose host left its snapshot
    ///
    /// Only objects whose name carries the watcher's prefix are considered.
    pub async fn garbage_collect(&self, watcher: &dyn Watcher) -> Result<CycleReport> {
        let hosts = watcher.store().hosts();
        self.collect_garbage(watcher, &hosts).await
    }

    /// Garbage collection against a snapshot the caller already holds
    async fn collect_garbage(
        &self,
        watcher: &dyn Watcher,
        hosts: &Snapshot,
    ) -> Result<CycleReport> {
        let prefix = watcher.prefix();
        let mut report = CycleReport::default();

        let owned = self
            .cache
            .list_by_prefix(prefix)
            .await
            .map_err(|e| self.failed(prefix, Operation::Lookup, e))?;

        for entry in owned {
            let Some(host) = entry.name().strip_prefix(prefix) else {
                warn!("Cache returned {} for prefix {}, ignoring", entry.name(), prefix);
                continue;
            };

            if hosts.contains_key(host) {
                continue;
            }

            match self.client.delete(entry.name()).await {
                Ok(()) => {
                    info!("Deleted {}: {} no longer in {}", entry.name(), host, watcher.name());
                    report.deleted += 1;
                    self.emit_event(SyncEvent::Deleted {
                        name: entry.name().to_string(),
                    });
                }
                Err(e) if e.is_not_found() => {
                    debug!("{} already deleted", entry.name());
                }
                Err(e) => {
                    self.failed(entry.name(), Operation::Delete, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn create(&self, desired: &ServiceEntry) -> Result<Reconciled> {
        let name = desired.name();

        self.client
            .create(desired)
            .await
            .map_err(|e| self.failed(name, Operation::Create, e))?;

        info!("Created {} ({} endpoint(s))", name, desired.spec.endpoints.len());
        self.emit_event(SyncEvent::Created {
            name: name.to_string(),
        });
        Ok(Reconciled::Created)
    }

    /// Log and report a failed call, handing the error back
    fn failed(&self, name: &str, operation: Operation, error: Error) -> Error {
        error!(
            "Failed to {} {} via {}: {}",
            operation,
            name,
            self.client.client_name(),
            error
        );
        self.emit_event(SyncEvent::OperationFailed {
            name: name.to_string(),
            operation,
            error: error.to_string(),
        });
        error
    }

    fn emit_event(&self, event: SyncEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Prefixes must be non-empty and none may be a prefix of another
fn validate_prefixes(watchers: &[Arc<dyn Watcher>]) -> Result<()> {
    for (i, a) in watchers.iter().enumerate() {
        if a.prefix().is_empty() {
            return Err(Error::config(format!("Backend {} has an empty prefix", a.name())));
        }

        for b in watchers.iter().skip(i + 1) {
            if a.prefix().starts_with(b.prefix()) || b.prefix().starts_with(a.prefix()) {
                return Err(Error::config(format!(
                    "Backends {} ({}) and {} ({}) have overlapping prefixes",
                    a.name(),
                    a.prefix(),
                    b.name(),
                    b.prefix()
                )));
            }
        }
    }

    Ok(())
}
