//! Configuration types for meshsync
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main meshsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshSyncConfig {
    /// Registry backends to mirror
    pub backends: Vec<BackendConfig>,

    /// Optional synchronizer settings
    #[serde(default)]
    pub synchronizer: SynchronizerConfig,
}

impl MeshSyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backends.push(backend);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.backends.is_empty() {
            return Err(crate::Error::config("No registry backends configured"));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            backend.validate()?;
            if !seen.insert(backend.type_name()) {
                return Err(crate::Error::config(format!(
                    "Registry backend '{}' configured more than once",
                    backend.type_name()
                )));
            }
        }

        self.synchronizer.validate()
    }
}

/// Registry backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Consul catalog
    Consul {
        /// Consul HTTP endpoint (e.g., "http://127.0.0.1:8500")
        endpoint: String,
        /// Consul Enterprise namespace (optional)
        #[serde(default)]
        namespace: Option<String>,
        /// Interval between catalog polls in seconds
        #[serde(default = "default_consul_tick_interval_secs")]
        tick_interval_secs: u64,
        /// Maximum blocking-query wait in seconds
        #[serde(default = "default_consul_wait_secs")]
        wait_secs: u64,
    },

    /// AWS Cloud Map
    CloudMap {
        /// AWS region (falls back to `AWS_REGION`)
        #[serde(default)]
        region: Option<String>,
        /// Static access key id (optional)
        #[serde(default)]
        access_key_id: Option<String>,
        /// Static secret access key (optional)
        #[serde(default)]
        secret_access_key: Option<String>,
        /// Interval between polls in seconds
        #[serde(default = "default_cloud_map_interval_secs")]
        interval_secs: u64,
    },

    /// Custom backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl BackendConfig {
    /// Consul backend with default intervals
    pub fn consul(endpoint: impl Into<String>) -> Self {
        BackendConfig::Consul {
            endpoint: endpoint.into(),
            namespace: None,
            tick_interval_secs: default_consul_tick_interval_secs(),
            wait_secs: default_consul_wait_secs(),
        }
    }

    /// Validate the backend configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BackendConfig::Consul {
                endpoint,
                tick_interval_secs,
                ..
            } => {
                if endpoint.is_empty() {
                    return Err(crate::Error::config("Consul endpoint not specified"));
                }
                if *tick_interval_secs == 0 {
                    return Err(crate::Error::config("Consul tick interval must be > 0"));
                }
                Ok(())
            }
            BackendConfig::CloudMap {
                access_key_id,
                secret_access_key,
                interval_secs,
                ..
            } => {
                if access_key_id.is_some() != secret_access_key.is_some() {
                    return Err(crate::Error::config(
                        "Cloud Map access key id and secret must be set together",
                    ));
                }
                if *interval_secs == 0 {
                    return Err(crate::Error::config("Cloud Map interval must be > 0"));
                }
                Ok(())
            }
            BackendConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom backend factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom backend config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            BackendConfig::Consul { .. } => "consul",
            BackendConfig::CloudMap { .. } => "cloudmap",
            BackendConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    /// Interval between reconciliation cycles (in seconds)
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,

    /// Namespace configuration objects are written to
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SynchronizerConfig {
    /// Validate the synchronizer configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Synchronizer interval must be > 0"));
        }
        if self.namespace.is_empty() {
            return Err(crate::Error::config("Synchronizer namespace cannot be empty"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval_secs(),
            namespace: default_namespace(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_consul_tick_interval_secs() -> u64 {
    10
}

fn default_consul_wait_secs() -> u64 {
    5
}

fn default_cloud_map_interval_secs() -> u64 {
    5
}

fn default_sync_interval_secs() -> u64 {
    5
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}
