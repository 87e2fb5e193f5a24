// # meshsync-core
//
// Core library mirroring external service registries into service-mesh
// configuration objects.
//
// ## Architecture Overview
//
// - **Store**: Concurrency-safe host → address records snapshot, one per backend
// - **infer**: Pure rules deriving resolution mode and ports from address records
// - **Watcher**: Trait for registry pollers publishing into their Store
// - **ConfigClient / ConfigCache**: Traits for the control plane and its local cache
// - **Synchronizer**: Periodic loop diffing desired against actual objects
// - **WatcherRegistry**: Plugin-based registry for backend watchers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Reconciliation is separate from registry protocols
// 2. **Snapshot Publishing**: Watchers replace their Store wholesale, never patch it
// 3. **Prefix Ownership**: Each backend only ever deletes objects bearing its prefix
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Every cycle recomputes desired state; unchanged state issues no calls

pub mod cache;
pub mod config;
pub mod error;
pub mod infer;
pub mod model;
pub mod registry;
pub mod store;
pub mod synchronizer;
pub mod traits;

// Re-export core types for convenience
pub use cache::MemoryConfigStore;
pub use config::{BackendConfig, MeshSyncConfig, SynchronizerConfig};
pub use error::{Error, Result};
pub use model::{AddressRecord, Resolution, ServiceEntry, ServiceEntrySpec, ServicePort, Snapshot};
pub use registry::WatcherRegistry;
pub use store::Store;
pub use synchronizer::{CycleReport, SyncEvent, Synchronizer};
pub use traits::{ConfigCache, ConfigClient, PollOutcome, Watcher};
