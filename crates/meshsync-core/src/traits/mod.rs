//! Core traits for meshsync
//!
//! This module defines the abstract interfaces of the external collaborators.
//!
//! - [`ConfigClient`]: Read and write configuration objects in the control plane
//! - [`ConfigCache`]: Locally cached, eventually consistent view of those objects
//! - [`Watcher`]: One registry backend feeding its own [`Store`](crate::Store)

pub mod config_client;
pub mod watcher;

pub use config_client::{ConfigCache, ConfigClient};
pub use watcher::{PollOutcome, ShutdownSignal, Watcher, WatcherFactory, wait_for_shutdown};
