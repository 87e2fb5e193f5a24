//! Minimal embedding example for meshsync-core
//!
//! This example demonstrates using meshsync-core as a library in a custom
//! application: an in-process registry as the backend, and a control-plane
//! client that prints every mutation before storing it in memory.
//! The synchronizer lifecycle is fully managed by the application.

use meshsync_core::traits::PollOutcome;
use meshsync_core::{
    AddressRecord, ConfigClient, MemoryConfigStore, Result, ServiceEntry, Snapshot, Store,
    Synchronizer, SynchronizerConfig, Watcher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registry living inside the application
struct InProcessWatcher {
    store: Arc<Store>,
    members: Mutex<Snapshot>,
}

impl InProcessWatcher {
    fn new() -> Self {
        Self {
            store: Arc::new(Store::new()),
            members: Mutex::new(Snapshot::new()),
        }
    }

    /// Register (or replace) the instances of one host
    fn register(&self, host: &str, records: Vec<AddressRecord>) {
        if let Ok(mut members) = self.members.lock() {
            members.insert(host.to_string(), records);
        }
    }

    fn deregister(&self, host: &str) {
        if let Ok(mut members) = self.members.lock() {
            members.remove(host);
        }
    }
}

#[async_trait::async_trait]
impl Watcher for InProcessWatcher {
    fn name(&self) -> &str {
        "in-process"
    }

    fn prefix(&self) -> &str {
        "inproc-"
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(50)
    }

    async fn poll(&self) -> PollOutcome {
        match self.members.lock() {
            Ok(members) => PollOutcome::Updated(members.clone()),
            Err(_) => PollOutcome::Failed("membership lock poisoned".to_string()),
        }
    }
}

/// Control-plane client printing each mutation
struct PrintingClient {
    inner: Arc<MemoryConfigStore>,
}

#[async_trait::async_trait]
impl ConfigClient for PrintingClient {
    async fn get(&self, name: &str) -> Result<ServiceEntry> {
        self.inner.get(name).await
    }

    async fn create(&self, entry: &ServiceEntry) -> Result<ServiceEntry> {
        println!(
            "[Embedded] create {} ({} endpoint(s))",
            entry.name(),
            entry.spec.endpoints.len()
        );
        self.inner.create(entry).await
    }

    async fn update(&self, entry: &ServiceEntry) -> Result<ServiceEntry> {
        println!(
            "[Embedded] update {} ({} endpoint(s))",
            entry.name(),
            entry.spec.endpoints.len()
        );
        self.inner.update(entry).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        println!("[Embedded] delete {}", name);
        self.inner.delete(name).await
    }

    fn client_name(&self) -> &'static str {
        "printing"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== Embedded meshsync-core Example ===\n");

    // Create custom components
    let watcher = Arc::new(InProcessWatcher::new());
    watcher.register(
        "payments.internal",
        vec![AddressRecord::new("10.0.0.1").with_port("https", 443)],
    );

    let objects = Arc::new(MemoryConfigStore::new());
    let client = Arc::new(PrintingClient {
        inner: objects.clone(),
    });

    let config = SynchronizerConfig {
        interval_secs: 1,
        namespace: "external".to_string(),
        event_channel_capacity: 100,
    };

    println!("1. Creating synchronizer...");
    let (synchronizer, mut event_rx) = Synchronizer::new(
        client,
        objects.clone(),
        vec![watcher.clone() as Arc<dyn Watcher>],
        config,
    )?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. Starting watcher and synchronizer in background...");
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let watcher_handle = tokio::spawn({
        let watcher = watcher.clone();
        let shutdown = shutdown_rx.clone();
        async move { watcher.run(shutdown).await }
    });
    let sync_handle = tokio::spawn(async move { synchronizer.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("\n3. Registry changes: one host added, one removed");
    watcher.register(
        "ledger.internal",
        vec![AddressRecord::new("ledger.internal").with_port("tcp", 5432)],
    );
    watcher.deregister("payments.internal");

    // Let the next cycle pick it up
    tokio::time::sleep(Duration::from_millis(1500)).await;

    println!("\n4. Stopping...");
    let _ = shutdown_tx.send(true);
    let _ = watcher_handle.await;
    if let Ok(result) = sync_handle.await {
        result?;
    }
    let _ = event_listener.await;

    println!("\n5. Objects left: {:?}", objects.names().await);
    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Lifecycle is fully controlled by the application");
    println!("- One shutdown signal stops every loop");
    println!("- Backend and control plane are both custom");

    Ok(())
}
