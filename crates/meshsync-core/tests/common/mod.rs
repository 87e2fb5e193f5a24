//! Test doubles and common utilities for synchronizer contract tests
//!
//! This module provides minimal test doubles that count calls without
//! implementing a real control plane.

#![allow(dead_code)]

use meshsync_core::error::{Error, Result};
use meshsync_core::infer;
use meshsync_core::model::{AddressRecord, ServiceEntry, Snapshot};
use meshsync_core::traits::{ConfigCache, ConfigClient, PollOutcome, Watcher};
use meshsync_core::{Store, SynchronizerConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "tetrate.io";

/// The record every default host resolves to
pub fn default_records() -> Vec<AddressRecord> {
    vec![
        AddressRecord::new("8.8.8.8")
            .with_port("http", 80)
            .with_port("https", 443),
    ]
}

/// Snapshot holding only [`DEFAULT_HOST`]
pub fn default_hosts() -> Snapshot {
    let mut hosts = Snapshot::new();
    hosts.insert(DEFAULT_HOST.to_string(), default_records());
    hosts
}

/// The object the synchronizer would create for `host` under `prefix`
pub fn entry_for(prefix: &str, host: &str, records: &[AddressRecord]) -> ServiceEntry {
    let mut entry = infer::desired_service_entry(prefix, "default", "test", host, records);
    entry.metadata.resource_version = Some("1".to_string());
    entry
}

/// Synchronizer config suitable for tests
pub fn test_config() -> SynchronizerConfig {
    SynchronizerConfig {
        interval_secs: 1,
        namespace: "default".to_string(),
        event_channel_capacity: 100,
    }
}

/// A watcher whose Store is filled by the test
pub struct StaticWatcher {
    name: String,
    prefix: String,
    store: Arc<Store>,
    poll_count: AtomicUsize,
}

impl StaticWatcher {
    pub fn new(name: &str, prefix: &str, hosts: Snapshot) -> Arc<Self> {
        let store = Arc::new(Store::new());
        store.set(hosts);

        Arc::new(Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            store,
            poll_count: AtomicUsize::new(0),
        })
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    /// Shared handle to the Store, for doubles that mutate it mid-cycle
    pub fn store_handle(&self) -> Arc<Store> {
        self.store.clone()
    }
}

#[async_trait::async_trait]
impl Watcher for StaticWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    async fn poll(&self) -> PollOutcome {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        PollOutcome::Unchanged
    }
}

/// A mock ConfigClient that tracks calls
///
/// `get` returns whatever was seeded or written through this client.
#[derive(Default)]
pub struct MockConfigClient {
    objects: Mutex<HashMap<String, ServiceEntry>>,
    get_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    fail_hosts: Mutex<Vec<String>>,
}

impl MockConfigClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the control plane hold `entry`
    pub fn seed(&self, entry: ServiceEntry) {
        self.objects
            .lock()
            .unwrap()
            .insert(entry.metadata.name.clone(), entry);
    }

    /// Fail every mutation of an object whose name ends with `host`
    pub fn fail_for(&self, host: &str) {
        self.fail_hosts.lock().unwrap().push(host.to_string());
    }

    /// Stop failing mutations
    pub fn clear_failures(&self) {
        self.fail_hosts.lock().unwrap().clear();
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.create_calls() + self.update_calls() + self.delete_calls()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn object(&self, name: &str) -> Option<ServiceEntry> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    fn check_failure(&self, name: &str) -> Result<()> {
        if self
            .fail_hosts
            .lock()
            .unwrap()
            .iter()
            .any(|host| name.ends_with(host.as_str()))
        {
            return Err(Error::config_client(format!("injected failure for {}", name)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigClient for MockConfigClient {
    async fn get(&self, name: &str) -> Result<ServiceEntry> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name.to_string()))
    }

    async fn create(&self, entry: &ServiceEntry) -> Result<ServiceEntry> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(entry.name())?;
        self.seed(entry.clone());
        Ok(entry.clone())
    }

    async fn update(&self, entry: &ServiceEntry) -> Result<ServiceEntry> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(entry.name())?;
        self.seed(entry.clone());
        Ok(entry.clone())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(name)?;
        self.deleted.lock().unwrap().push(name.to_string());
        self.objects.lock().unwrap().remove(name);
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock ConfigCache holding a fixed set of objects
///
/// Independent of [`MockConfigClient`]: writes through the client are not
/// reflected here, like a cache that has not caught up yet.
#[derive(Default)]
pub struct MockConfigCache {
    objects: Mutex<HashMap<String, ServiceEntry>>,
    list_calls: AtomicUsize,
    fail_list: AtomicBool,
}

impl MockConfigCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_entries(entries: Vec<ServiceEntry>) -> Arc<Self> {
        let cache = Self::default();
        for entry in entries {
            cache
                .objects
                .lock()
                .unwrap()
                .insert(entry.metadata.name.clone(), entry);
        }
        Arc::new(cache)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Make `list_by_prefix` fail until switched off again
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ConfigCache for MockConfigCache {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ServiceEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::config_client(format!("injected list failure for {}*", prefix)));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.name().starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ServiceEntry>> {
        Ok(self.objects.lock().unwrap().get(name).cloned())
    }
}
