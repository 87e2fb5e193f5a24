// # meshsyncd - Registry Mirroring Daemon
//
// This daemon is a THIN integration layer. Registry protocols live in the
// watcher crates and reconciliation lives in meshsync-core; nothing here
// decides what an object should look like.
//
// The meshsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and logging
// 3. Registering watchers
// 4. Running one task per watcher plus the synchronizer until a signal arrives
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Consul
// - `MESHSYNC_CONSUL_ENDPOINT`: Consul HTTP endpoint (required)
// - `MESHSYNC_CONSUL_NAMESPACE`: Consul Enterprise namespace (optional)
// - `MESHSYNC_CONSUL_TICK_INTERVAL`: Seconds between catalog polls (default 10)
// - `MESHSYNC_CONSUL_WAIT`: Blocking-query wait in seconds (default 5)
//
// ### Synchronizer
// - `MESHSYNC_NAMESPACE`: Namespace the objects are written to (default "default")
// - `MESHSYNC_SYNC_INTERVAL`: Seconds between reconciliation cycles (default 5)
// - `MESHSYNC_CONFIG_STORE`: Configuration store (memory)
//
// ### Logging
// - `MESHSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export MESHSYNC_CONSUL_ENDPOINT=http://127.0.0.1:8500
// export MESHSYNC_NAMESPACE=external
// export MESHSYNC_CONFIG_STORE=memory
//
// meshsyncd
// ```
//
// The memory store is a dry run: objects are reconciled and logged but never
// leave the process. Writing to a real control plane means embedding
// meshsync-core with a `ConfigClient` for it.

use anyhow::{Context, Result};
use meshsync_core::{
    BackendConfig, MemoryConfigStore, MeshSyncConfig, Store, SyncEvent, Synchronizer,
    SynchronizerConfig, Watcher, WatcherRegistry,
};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Maximum time to wait for tasks to finish after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MeshSyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MeshSyncExitCode> for ExitCode {
    fn from(code: MeshSyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    consul_endpoint: String,
    consul_namespace: Option<String>,
    consul_tick_interval_secs: u64,
    consul_wait_secs: u64,
    namespace: String,
    sync_interval_secs: u64,
    config_store_type: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            consul_endpoint: lookup("MESHSYNC_CONSUL_ENDPOINT").unwrap_or_default(),
            consul_namespace: lookup("MESHSYNC_CONSUL_NAMESPACE").filter(|ns| !ns.is_empty()),
            consul_tick_interval_secs: parse_or(&lookup, "MESHSYNC_CONSUL_TICK_INTERVAL", 10)?,
            consul_wait_secs: parse_or(&lookup, "MESHSYNC_CONSUL_WAIT", 5)?,
            namespace: lookup("MESHSYNC_NAMESPACE").unwrap_or_else(|| "default".to_string()),
            sync_interval_secs: parse_or(&lookup, "MESHSYNC_SYNC_INTERVAL", 5)?,
            config_store_type: lookup("MESHSYNC_CONFIG_STORE")
                .unwrap_or_else(|| "memory".to_string()),
            log_level: lookup("MESHSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Library configuration equivalent to these settings
    fn mesh_config(&self) -> MeshSyncConfig {
        let mut config = MeshSyncConfig::new().with_backend(BackendConfig::Consul {
            endpoint: self.consul_endpoint.clone(),
            namespace: self.consul_namespace.clone(),
            tick_interval_secs: self.consul_tick_interval_secs,
            wait_secs: self.consul_wait_secs,
        });
        config.synchronizer = SynchronizerConfig {
            interval_secs: self.sync_interval_secs,
            namespace: self.namespace.clone(),
            ..SynchronizerConfig::default()
        };
        config
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.consul_endpoint.is_empty() {
            anyhow::bail!(
                "MESHSYNC_CONSUL_ENDPOINT is required. \
                Set it via: export MESHSYNC_CONSUL_ENDPOINT=http://127.0.0.1:8500"
            );
        }

        if !self.consul_endpoint.starts_with("http://")
            && !self.consul_endpoint.starts_with("https://")
        {
            anyhow::bail!(
                "MESHSYNC_CONSUL_ENDPOINT must use HTTP or HTTPS scheme. Got: {}",
                self.consul_endpoint
            );
        }

        match self.config_store_type.as_str() {
            "memory" => {}
            _ => anyhow::bail!(
                "MESHSYNC_CONFIG_STORE '{}' is not supported. \
                Supported stores: memory",
                self.config_store_type
            ),
        }

        if self.namespace.is_empty() {
            anyhow::bail!("MESHSYNC_NAMESPACE cannot be empty");
        }

        if !(1..=3600).contains(&self.sync_interval_secs) {
            anyhow::bail!(
                "MESHSYNC_SYNC_INTERVAL must be between 1 and 3600 seconds. Got: {}",
                self.sync_interval_secs
            );
        }

        if !(1..=600).contains(&self.consul_wait_secs) {
            anyhow::bail!(
                "MESHSYNC_CONSUL_WAIT must be between 1 and 600 seconds. Got: {}",
                self.consul_wait_secs
            );
        }

        self.log_level()?;

        self.mesh_config()
            .validate()
            .context("invalid backend configuration")
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "MESHSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number. Got: {}", key, value)),
        None => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return MeshSyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return MeshSyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MeshSyncExitCode::ConfigError.into();
    }

    info!("Starting meshsyncd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MeshSyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            MeshSyncExitCode::RuntimeError
        } else {
            MeshSyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = WatcherRegistry::new();

    #[cfg(feature = "consul")]
    {
        info!("Registering Consul watcher");
        meshsync_consul::register(&registry);
    }

    let mesh_config = config.mesh_config();

    let mut watchers: Vec<Arc<dyn Watcher>> = Vec::with_capacity(mesh_config.backends.len());
    for backend in &mesh_config.backends {
        let watcher = registry
            .create_watcher(backend, Arc::new(Store::new()))
            .with_context(|| format!("failed to create {} watcher", backend.type_name()))?;
        watchers.push(watcher);
    }

    info!(
        "Config store: {} (dry run, objects stay in memory)",
        config.config_store_type
    );
    let config_store = Arc::new(MemoryConfigStore::new());

    let (synchronizer, events) = Synchronizer::new(
        config_store.clone(),
        config_store.clone(),
        watchers.clone(),
        mesh_config.synchronizer,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut watcher_tasks: Vec<JoinHandle<()>> = Vec::with_capacity(watchers.len());
    for watcher in watchers {
        let shutdown = shutdown_rx.clone();
        watcher_tasks.push(tokio::spawn(async move { watcher.run(shutdown).await }));
    }

    let sync_task = tokio::spawn(async move { synchronizer.run(shutdown_rx).await });
    let event_task = tokio::spawn(log_events(events));

    info!("Daemon initialized successfully");

    let signal = wait_for_signal().await?;
    info!("Received shutdown signal: {}", signal);

    // Receivers may already be gone if a task died early
    let _ = shutdown_tx.send(true);

    let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        for task in watcher_tasks {
            if let Err(e) = task.await {
                warn!("Watcher task ended abnormally: {}", e);
            }
        }
        let sync_result = sync_task.await;
        let _ = event_task.await;
        sync_result
    })
    .await
    .map_err(|_| anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))?;

    joined.context("synchronizer task panicked")??;

    info!(
        "Shutting down daemon ({} object(s) in the dry-run store)",
        config_store.len().await
    );
    Ok(())
}

/// Log synchronizer events until the synchronizer goes away
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::OperationFailed { .. } => warn!("{:?}", event),
            _ => debug!("{:?}", event),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
