// # Configuration Store Implementations
//
// This module provides implementations of the ConfigClient and ConfigCache
// traits that do not need a control plane.

pub mod memory;

pub use memory::MemoryConfigStore;
