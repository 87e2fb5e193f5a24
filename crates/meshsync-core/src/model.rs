// # Data Model
//
// Registry-side records and mesh-side configuration objects.
//
// ## Registry side
//
// - `AddressRecord`: one reachable member of a host (address + labeled ports)
// - `Snapshot`: host → records, wholesale-replaced on every poller cycle
//
// ## Mesh side
//
// - `ServiceEntry`: the configuration object held by the control plane
// - `ServiceEntrySpec`: the mesh-relevant part the synchronizer owns
// - `ObjectMeta`: control-plane metadata (never diffed)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One reachable endpoint for a host
///
/// Ports are keyed by protocol label ("http", "https", "tcp").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRecord {
    /// IP literal or DNS name
    pub address: String,
    /// Protocol label → port number
    #[serde(default)]
    pub ports: BTreeMap<String, u32>,
}

impl AddressRecord {
    /// Create a record with no ports
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ports: BTreeMap::new(),
        }
    }

    /// Add a labeled port
    pub fn with_port(mut self, label: impl Into<String>, number: u32) -> Self {
        self.ports.insert(label.into(), number);
        self
    }
}

/// Full membership of one backend: host → address records
pub type Snapshot = HashMap<String, Vec<AddressRecord>>;

/// How the mesh resolves members of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    /// Resolve members by name at connect time
    Dns,
    /// Fixed IP members
    Static,
}

/// Whether the host lives inside or outside the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    /// Outside the mesh (default for registry-sourced hosts)
    #[default]
    MeshExternal,
    /// Inside the mesh
    MeshInternal,
}

/// Port descriptor on a configuration object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServicePort {
    /// Port number
    pub number: u32,
    /// Port name (the protocol label)
    pub name: String,
    /// Upper-cased protocol
    pub protocol: String,
}

impl ServicePort {
    /// Build a descriptor from a protocol label, upper-casing the protocol
    pub fn new(number: u32, label: impl Into<String>) -> Self {
        let name = label.into();
        let protocol = name.to_uppercase();
        Self {
            number,
            name,
            protocol,
        }
    }
}

/// Mesh-relevant fields of a configuration object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntrySpec {
    pub hosts: Vec<String>,
    #[serde(default)]
    pub location: Location,
    pub resolution: Resolution,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub endpoints: Vec<AddressRecord>,
}

impl ServiceEntrySpec {
    /// Metadata-blind comparison of the fields the synchronizer owns
    ///
    /// Hosts, ports and endpoints compare as sorted lists: order is ignored
    /// but a duplicated element is a difference. `location` is not part of
    /// the comparison.
    pub fn mesh_equivalent(&self, other: &Self) -> bool {
        self.resolution == other.resolution
            && sorted(&self.hosts) == sorted(&other.hosts)
            && sorted(&self.ports) == sorted(&other.ports)
            && sorted_endpoints(&self.endpoints) == sorted_endpoints(&other.endpoints)
    }
}

fn sorted<T: Ord>(items: &[T]) -> Vec<&T> {
    let mut items: Vec<&T> = items.iter().collect();
    items.sort();
    items
}

fn sorted_endpoints(endpoints: &[AddressRecord]) -> Vec<(&str, &BTreeMap<String, u32>)> {
    let mut endpoints: Vec<_> = endpoints
        .iter()
        .map(|e| (e.address.as_str(), &e.ports))
        .collect();
    endpoints.sort();
    endpoints
}

/// Control-plane metadata of a configuration object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Optimistic concurrency token assigned by the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Configuration object mirrored into the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub metadata: ObjectMeta,
    pub spec: ServiceEntrySpec,
}

impl ServiceEntry {
    /// Object name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
