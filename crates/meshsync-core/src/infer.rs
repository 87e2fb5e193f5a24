//! Inference rules
//!
//! Pure functions deriving mesh configuration fields from registry address
//! records. None of them fail: empty or zero input degrades to a default.

use crate::model::{
    AddressRecord, Location, ObjectMeta, Resolution, ServiceEntry, ServiceEntrySpec, ServicePort,
};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use tracing::warn;

/// Label attached to every object the synchronizer creates
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY_VALUE: &str = "meshsync";

/// Annotation naming the registry an object was mirrored from
pub const REGISTRY_ANNOTATION: &str = "meshsync.io/registry";

/// Infer the resolution mode for a host's records
///
/// STATIC only when every address is an IP literal. An empty set is DNS.
pub fn resolution(records: &[AddressRecord]) -> Resolution {
    if records.is_empty() {
        return Resolution::Dns;
    }

    if records
        .iter()
        .all(|r| r.address.parse::<IpAddr>().is_ok())
    {
        Resolution::Static
    } else {
        Resolution::Dns
    }
}

/// Union of ports across records, deduplicated by (number, label)
///
/// Sorted by number, then label.
pub fn ports(records: &[AddressRecord]) -> Vec<ServicePort> {
    let unique: BTreeSet<(u32, &str)> = records
        .iter()
        .flat_map(|r| r.ports.iter().map(|(label, number)| (*number, label.as_str())))
        .collect();

    unique
        .into_iter()
        .map(|(number, label)| ServicePort::new(number, label))
        .collect()
}

/// Protocol label for a port number
pub fn protocol_for_port(port: u32) -> &'static str {
    match port {
        80 => "http",
        443 => "https",
        _ => "tcp",
    }
}

/// Build a record for one address/port pair
///
/// A port of zero or below means "no explicit port": the record gets both
/// http (80) and https (443). A port above `u32::MAX` cannot be carried and
/// gets the same default, with a warning.
pub fn build_address_record(address: impl Into<String>, port: i64) -> AddressRecord {
    let address = address.into();

    match u32::try_from(port) {
        Ok(port) if port > 0 => {
            AddressRecord::new(address).with_port(protocol_for_port(port), port)
        }
        Ok(_) => default_address_record(address),
        Err(_) if port > 0 => {
            warn!("Port {} of {} is out of range, using http/https defaults", port, address);
            default_address_record(address)
        }
        Err(_) => default_address_record(address),
    }
}

/// Record with the http/https pair used when a registry reports no port
pub fn default_address_record(address: impl Into<String>) -> AddressRecord {
    AddressRecord::new(address)
        .with_port("http", 80)
        .with_port("https", 443)
}

/// Object name for a host owned by the backend with `prefix`
pub fn service_entry_name(prefix: &str, host: &str) -> String {
    format!("{}{}", prefix, host)
}

/// Desired configuration object for one host
///
/// Endpoints are sorted by address so the result is deterministic.
pub fn desired_service_entry(
    prefix: &str,
    namespace: &str,
    registry: &str,
    host: &str,
    records: &[AddressRecord],
) -> ServiceEntry {
    let mut endpoints = records.to_vec();
    endpoints.sort_by(|a, b| a.address.cmp(&b.address));

    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());

    let mut annotations = BTreeMap::new();
    annotations.insert(REGISTRY_ANNOTATION.to_string(), registry.to_string());

    ServiceEntry {
        metadata: ObjectMeta {
            name: service_entry_name(prefix, host),
            namespace: namespace.to_string(),
            resource_version: None,
            labels,
            annotations,
        },
        spec: ServiceEntrySpec {
            hosts: vec![host.to_string()],
            location: Location::MeshExternal,
            resolution: resolution(records),
            ports: ports(records),
            endpoints,
        },
    }
}
