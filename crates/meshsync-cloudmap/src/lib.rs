// # AWS Cloud Map Watcher
//
// This crate mirrors AWS Cloud Map namespaces into a meshsync Store.
//
// ## Client
//
// The Cloud Map API is reached through the [`ServiceDiscoveryClient`] trait.
// Embedders supply an implementation backed by their AWS SDK of choice,
// through a [`ClientBuilder`] that receives the resolved region and the
// static credentials from the backend config. This crate owns everything
// after the API call: host naming, instance conversion and snapshot
// publishing.
//
// ## Refresh
//
// 1. List every namespace
// 2. List the services of each namespace (filtered by namespace id)
// 3. Discover the instances of each service
//
// Any failing call aborts the whole refresh, so the Store keeps serving the
// previous complete snapshot instead of a partial one.
//
// ## Conversion
//
// - host = `<service>.<namespace>`
// - a service without instances resolves to its own host name
// - address = `AWS_INSTANCE_IPV4`, else `AWS_INSTANCE_CNAME`, else skipped
// - `AWS_INSTANCE_PORT` selects the port; absent or non-numeric means
//   http (80) and https (443)

use meshsync_core::config::BackendConfig;
use meshsync_core::infer;
use meshsync_core::model::{AddressRecord, Snapshot};
use meshsync_core::traits::{PollOutcome, Watcher, WatcherFactory};
use meshsync_core::{Error, Result, Store, WatcherRegistry};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Prefix of every object owned by this backend
pub const PREFIX: &str = "cloudmap-";

/// Default interval between refreshes
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

pub const ATTR_INSTANCE_IPV4: &str = "AWS_INSTANCE_IPV4";
pub const ATTR_INSTANCE_CNAME: &str = "AWS_INSTANCE_CNAME";
pub const ATTR_INSTANCE_PORT: &str = "AWS_INSTANCE_PORT";

/// Environment variable consulted when no region is configured
pub const REGION_ENV: &str = "AWS_REGION";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NamespaceSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceSummary {
    pub id: String,
    pub name: String,
}

/// One registered instance as returned by `DiscoverInstances`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub namespace_name: String,
    pub service_name: String,
    pub attributes: HashMap<String, String>,
}

impl InstanceSummary {
    /// Instance carrying only the given attributes
    pub fn with_attributes<I, K, V>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }
}

/// The subset of the Cloud Map API the watcher needs
#[async_trait]
pub trait ServiceDiscoveryClient: Send + Sync {
    /// Every namespace visible to the caller
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>>;

    /// Services whose namespace id equals `namespace_id`
    async fn list_services(&self, namespace_id: &str) -> Result<Vec<ServiceSummary>>;

    /// Registered instances of one service
    async fn discover_instances(
        &self,
        namespace_name: &str,
        service_name: &str,
    ) -> Result<Vec<InstanceSummary>>;
}

/// Access key pair configured for the backend
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StaticCredentials {
    /// The configured pair, or `None` to use the SDK's default provider chain
    pub fn from_config(
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
    ) -> Option<Self> {
        match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Self {
                access_key_id: id.to_string(),
                secret_access_key: secret.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Builds the API client for a resolved region and optional credentials
pub type ClientBuilder = Arc<
    dyn Fn(&str, Option<StaticCredentials>) -> Result<Arc<dyn ServiceDiscoveryClient>>
        + Send
        + Sync,
>;

/// Pick the region: the configured one, else [`REGION_ENV`]
pub fn resolve_region(configured: Option<&str>) -> Result<String> {
    select_region(configured, std::env::var(REGION_ENV).ok())
}

fn select_region(configured: Option<&str>, from_env: Option<String>) -> Result<String> {
    match configured.filter(|r| !r.is_empty()) {
        Some(region) => Ok(region.to_string()),
        None => from_env.ok_or_else(|| Error::config("AWS region must be specified")),
    }
}

/// Convert one instance into an address record
///
/// Returns `None` when the instance has neither an IPv4 nor a CNAME
/// attribute (e.g. alias instances).
pub fn instance_to_record(instance: &InstanceSummary) -> Option<AddressRecord> {
    let address = instance
        .attributes
        .get(ATTR_INSTANCE_IPV4)
        .or_else(|| instance.attributes.get(ATTR_INSTANCE_CNAME))
        .filter(|a| !a.is_empty());

    let Some(address) = address else {
        tracing::info!(
            "instance {} of {}.{} is of a type that is not currently supported",
            instance.instance_id,
            instance.service_name,
            instance.namespace_name
        );
        return None;
    };

    if let Some(port) = instance.attributes.get(ATTR_INSTANCE_PORT) {
        match port.parse::<i64>() {
            Ok(port) => return Some(infer::build_address_record(address.clone(), port)),
            Err(e) => tracing::error!("error converting Port string {} to int: {}", port, e),
        }
    }

    tracing::info!(
        "no port found for address {}, assuming http (80) and https (443)",
        address
    );
    Some(infer::default_address_record(address.clone()))
}

/// Convert every supported instance, preserving order
pub fn instances_to_records(instances: &[InstanceSummary]) -> Vec<AddressRecord> {
    instances.iter().filter_map(instance_to_record).collect()
}

/// Watcher polling AWS Cloud Map
pub struct CloudMapWatcher {
    client: Arc<dyn ServiceDiscoveryClient>,
    store: Arc<Store>,
    interval: Duration,
}

impl CloudMapWatcher {
    /// Create a watcher with the default interval
    pub fn new(client: Arc<dyn ServiceDiscoveryClient>, store: Arc<Store>) -> Self {
        Self {
            client,
            store,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        }
    }

    /// Create with custom polling interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Hosts of every service in one namespace
    pub async fn hosts_for_namespace(&self, namespace: &NamespaceSummary) -> Result<Snapshot> {
        let services = self.client.list_services(&namespace.id).await.map_err(|e| {
            Error::backend(
                "cloudmap",
                format!(
                    "error retrieving service list for namespace {:?}: {}",
                    namespace.name, e
                ),
            )
        })?;

        let mut hosts = Snapshot::with_capacity(services.len());
        for service in &services {
            let host = format!("{}.{}", service.name, namespace.name);
            let records = self.records_for_service(service, namespace).await?;
            tracing::info!("{} address record(s) found for {:?}", records.len(), host);
            hosts.insert(host, records);
        }

        Ok(hosts)
    }

    /// Address records of one service
    ///
    /// A service without instances is published as a single record pointing
    /// at its own host name.
    pub async fn records_for_service(
        &self,
        service: &ServiceSummary,
        namespace: &NamespaceSummary,
    ) -> Result<Vec<AddressRecord>> {
        let mut instances = self
            .client
            .discover_instances(&namespace.name, &service.name)
            .await
            .map_err(|e| {
                Error::backend(
                    "cloudmap",
                    format!(
                        "error retrieving instance list for {:?} in {:?}: {}",
                        service.name, namespace.name, e
                    ),
                )
            })?;

        if instances.is_empty() {
            let host = format!("{}.{}", service.name, namespace.name);
            instances.push(InstanceSummary::with_attributes([(ATTR_INSTANCE_CNAME, host)]));
        }

        Ok(instances_to_records(&instances))
    }

    async fn collect(&self) -> Result<Snapshot> {
        let namespaces = self.client.list_namespaces().await.map_err(|e| {
            Error::backend(
                "cloudmap",
                format!("error retrieving namespace list: {}", e),
            )
        })?;

        let mut snapshot = Snapshot::new();
        for namespace in &namespaces {
            // Hosts embed the namespace name, so namespaces never collide
            snapshot.extend(self.hosts_for_namespace(namespace).await?);
        }

        Ok(snapshot)
    }
}

#[async_trait]
impl Watcher for CloudMapWatcher {
    fn name(&self) -> &str {
        "cloudmap"
    }

    fn prefix(&self) -> &str {
        PREFIX
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn poll(&self) -> PollOutcome {
        tracing::info!("Syncing Cloud Map store");

        match self.collect().await {
            Ok(snapshot) => {
                tracing::info!("Cloud Map store sync successful");
                PollOutcome::Updated(snapshot)
            }
            Err(e) => PollOutcome::Failed(format!(
                "unable to refresh Cloud Map cache, using existing cache: {}",
                e
            )),
        }
    }
}

/// Factory for creating Cloud Map watchers
///
/// The client is built per watcher from the backend's region and
/// credentials.
pub struct CloudMapFactory {
    build_client: ClientBuilder,
}

impl CloudMapFactory {
    pub fn new<F>(build_client: F) -> Self
    where
        F: Fn(&str, Option<StaticCredentials>) -> Result<Arc<dyn ServiceDiscoveryClient>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            build_client: Arc::new(build_client),
        }
    }
}

impl WatcherFactory for CloudMapFactory {
    fn create(&self, config: &BackendConfig, store: Arc<Store>) -> Result<Arc<dyn Watcher>> {
        match config {
            BackendConfig::CloudMap {
                region,
                access_key_id,
                secret_access_key,
                interval_secs,
            } => {
                let region = resolve_region(region.as_deref())?;
                let credentials = StaticCredentials::from_config(
                    access_key_id.as_deref(),
                    secret_access_key.as_deref(),
                );
                tracing::info!(
                    "Cloud Map watcher for region {} ({} credentials)",
                    region,
                    if credentials.is_some() { "static" } else { "default" }
                );

                let client = (self.build_client)(&region, credentials)?;
                Ok(Arc::new(
                    CloudMapWatcher::new(client, store)
                        .with_interval(Duration::from_secs(*interval_secs)),
                ))
            }
            _ => Err(Error::config("Invalid config for Cloud Map watcher")),
        }
    }
}

/// Register the Cloud Map watcher with a registry
pub fn register<F>(registry: &WatcherRegistry, build_client: F)
where
    F: Fn(&str, Option<StaticCredentials>) -> Result<Arc<dyn ServiceDiscoveryClient>>
        + Send
        + Sync
        + 'static,
{
    registry.register_watcher("cloudmap", Box::new(CloudMapFactory::new(build_client)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const IPV4_1: &str = "8.8.8.8";
    const IPV4_2: &str = "9.9.9.9";
    const SUBDOMAIN: &str = "demo";
    const HOSTNAME: &str = "tetrate.io";
    const CNAME: &str = "demo.tetrate.io";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        ListNamespaces,
        ListServices,
        DiscoverInstances,
    }

    #[derive(Default)]
    struct MockServiceDiscovery {
        namespaces: Vec<NamespaceSummary>,
        services: Vec<ServiceSummary>,
        instances: Vec<InstanceSummary>,
        fail: Option<Call>,
        calls: Mutex<Vec<(Call, String)>>,
    }

    impl MockServiceDiscovery {
        fn golden_path() -> Self {
            Self {
                namespaces: vec![namespace()],
                services: vec![service()],
                instances: vec![InstanceSummary::with_attributes([(
                    ATTR_INSTANCE_IPV4,
                    IPV4_1,
                )])],
                ..Self::default()
            }
        }

        fn failing(mut self, call: Call) -> Arc<Self> {
            self.fail = Some(call);
            Arc::new(self)
        }

        fn check(&self, call: Call, arg: String) -> Result<()> {
            self.calls.lock().unwrap().push((call, arg));
            if self.fail == Some(call) {
                return Err(Error::http("bang"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ServiceDiscoveryClient for MockServiceDiscovery {
        async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>> {
            self.check(Call::ListNamespaces, String::new())?;
            Ok(self.namespaces.clone())
        }

        async fn list_services(&self, namespace_id: &str) -> Result<Vec<ServiceSummary>> {
            self.check(Call::ListServices, namespace_id.to_string())?;
            Ok(self.services.clone())
        }

        async fn discover_instances(
            &self,
            namespace_name: &str,
            service_name: &str,
        ) -> Result<Vec<InstanceSummary>> {
            self.check(
                Call::DiscoverInstances,
                format!("{}/{}", namespace_name, service_name),
            )?;
            Ok(self.instances.clone())
        }
    }

    fn namespace() -> NamespaceSummary {
        NamespaceSummary {
            id: "ns-1234".to_string(),
            name: HOSTNAME.to_string(),
        }
    }

    fn service() -> ServiceSummary {
        ServiceSummary {
            id: "srv-1234".to_string(),
            name: SUBDOMAIN.to_string(),
        }
    }

    fn watcher(client: Arc<MockServiceDiscovery>) -> CloudMapWatcher {
        CloudMapWatcher::new(client, Arc::new(Store::new()))
    }

    fn inferred(address: &str) -> AddressRecord {
        infer::default_address_record(address)
    }

    fn unsupported() -> InstanceSummary {
        InstanceSummary {
            instance_id: SUBDOMAIN.to_string(),
            service_name: SUBDOMAIN.to_string(),
            namespace_name: HOSTNAME.to_string(),
            attributes: [("AWS_ALIAS_DNS_NAME".to_string(), HOSTNAME.to_string())].into(),
        }
    }

    #[tokio::test]
    async fn test_refresh_updates_store() {
        let watcher = watcher(Arc::new(MockServiceDiscovery::golden_path()));

        assert!(watcher.refresh().await);

        let hosts = watcher.store().hosts();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[CNAME], vec![inferred(IPV4_1)]);
    }

    #[tokio::test]
    async fn test_refresh_keeps_store_on_list_namespaces_error() {
        let client = MockServiceDiscovery::golden_path().failing(Call::ListNamespaces);
        let watcher = watcher(client);

        assert!(matches!(watcher.poll().await, PollOutcome::Failed(_)));
        assert!(!watcher.refresh().await);
        assert!(watcher.store().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_store_on_list_services_error() {
        let client = MockServiceDiscovery::golden_path().failing(Call::ListServices);
        let watcher = watcher(client);

        assert!(!watcher.refresh().await);
        assert!(watcher.store().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_snapshot_on_discover_error() {
        let store = Arc::new(Store::new());
        let healthy = CloudMapWatcher::new(
            Arc::new(MockServiceDiscovery::golden_path()),
            store.clone(),
        );
        healthy.refresh().await;

        let broken = CloudMapWatcher::new(
            MockServiceDiscovery::golden_path().failing(Call::DiscoverInstances),
            store.clone(),
        );
        assert!(!broken.refresh().await);

        assert_eq!(store.records(CNAME), Some(vec![inferred(IPV4_1)]));
    }

    #[tokio::test]
    async fn test_hosts_for_namespace() {
        let client = Arc::new(MockServiceDiscovery::golden_path());
        let watcher = watcher(client.clone());

        let hosts = watcher.hosts_for_namespace(&namespace()).await.unwrap();

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[CNAME], vec![inferred(IPV4_1)]);

        // Services are filtered by namespace id, instances discovered by name
        let calls = client.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (Call::ListServices, "ns-1234".to_string()),
                (Call::DiscoverInstances, "tetrate.io/demo".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_service_without_instances_resolves_to_host() {
        let client = MockServiceDiscovery {
            instances: Vec::new(),
            ..MockServiceDiscovery::golden_path()
        };
        let watcher = watcher(Arc::new(client));

        let hosts = watcher.hosts_for_namespace(&namespace()).await.unwrap();
        assert_eq!(hosts[CNAME], vec![inferred(CNAME)]);

        let records = watcher
            .records_for_service(&service(), &namespace())
            .await
            .unwrap();
        assert_eq!(records, vec![inferred(CNAME)]);
    }

    #[tokio::test]
    async fn test_hosts_for_namespace_errors() {
        let watcher_a = watcher(MockServiceDiscovery::golden_path().failing(Call::DiscoverInstances));
        assert!(watcher_a.hosts_for_namespace(&namespace()).await.is_err());

        let watcher_b = watcher(MockServiceDiscovery::golden_path().failing(Call::ListServices));
        assert!(watcher_b.hosts_for_namespace(&namespace()).await.is_err());
    }

    #[tokio::test]
    async fn test_services_across_namespaces() {
        let client = MockServiceDiscovery {
            namespaces: vec![
                namespace(),
                NamespaceSummary {
                    id: "ns-5678".to_string(),
                    name: "example.com".to_string(),
                },
            ],
            ..MockServiceDiscovery::golden_path()
        };
        let watcher = watcher(Arc::new(client));

        let PollOutcome::Updated(snapshot) = watcher.poll().await else {
            panic!("expected an updated snapshot");
        };

        let mut hosts: Vec<&String> = snapshot.keys().collect();
        hosts.sort();
        assert_eq!(hosts, vec!["demo.example.com", "demo.tetrate.io"]);
    }

    #[test]
    fn test_instances_to_records() {
        let same_type = [
            InstanceSummary::with_attributes([(ATTR_INSTANCE_IPV4, IPV4_1)]),
            InstanceSummary::with_attributes([(ATTR_INSTANCE_IPV4, IPV4_2)]),
        ];
        assert_eq!(
            instances_to_records(&same_type),
            vec![inferred(IPV4_1), inferred(IPV4_2)]
        );

        let differing_type = [
            InstanceSummary::with_attributes([(ATTR_INSTANCE_IPV4, IPV4_1)]),
            unsupported(),
        ];
        assert_eq!(instances_to_records(&differing_type), vec![inferred(IPV4_1)]);

        let empty_attributes = [InstanceSummary::default()];
        assert!(instances_to_records(&empty_attributes).is_empty());

        assert!(instances_to_records(&[]).is_empty());
    }

    #[test]
    fn test_instance_to_record() {
        let cases = [
            (
                vec![(ATTR_INSTANCE_IPV4, IPV4_1), (ATTR_INSTANCE_PORT, "80")],
                Some(AddressRecord::new(IPV4_1).with_port("http", 80)),
            ),
            (
                vec![(ATTR_INSTANCE_CNAME, CNAME), (ATTR_INSTANCE_PORT, "80")],
                Some(AddressRecord::new(CNAME).with_port("http", 80)),
            ),
            (
                vec![(ATTR_INSTANCE_IPV4, IPV4_1), (ATTR_INSTANCE_PORT, "9999")],
                Some(AddressRecord::new(IPV4_1).with_port("tcp", 9999)),
            ),
            (
                vec![(ATTR_INSTANCE_CNAME, CNAME), (ATTR_INSTANCE_PORT, "9999")],
                Some(AddressRecord::new(CNAME).with_port("tcp", 9999)),
            ),
            (vec![(ATTR_INSTANCE_IPV4, IPV4_1)], Some(inferred(IPV4_1))),
            (
                vec![(ATTR_INSTANCE_IPV4, IPV4_1), (ATTR_INSTANCE_PORT, HOSTNAME)],
                Some(inferred(IPV4_1)),
            ),
            (
                vec![(ATTR_INSTANCE_IPV4, IPV4_1), (ATTR_INSTANCE_CNAME, CNAME)],
                Some(inferred(IPV4_1)),
            ),
        ];

        for (attributes, want) in cases {
            let instance = InstanceSummary::with_attributes(attributes.clone());
            assert_eq!(instance_to_record(&instance), want, "attributes: {:?}", attributes);
        }

        assert_eq!(instance_to_record(&unsupported()), None);
    }

    #[test]
    fn test_instance_summary_deserializes_api_json() {
        let json = r#"{
            "InstanceId": "i-1",
            "NamespaceName": "tetrate.io",
            "ServiceName": "demo",
            "HealthStatus": "HEALTHY",
            "Attributes": {"AWS_INSTANCE_IPV4": "8.8.8.8", "AWS_INSTANCE_PORT": "443"}
        }"#;

        let instance: InstanceSummary = serde_json::from_str(json).unwrap();
        assert_eq!(instance.instance_id, "i-1");
        assert_eq!(
            instance_to_record(&instance),
            Some(AddressRecord::new(IPV4_1).with_port("https", 443))
        );
    }

    #[test]
    fn test_region_selection() {
        assert_eq!(
            select_region(Some("us-west-2"), Some("eu-west-1".to_string())).unwrap(),
            "us-west-2"
        );
        assert_eq!(
            select_region(None, Some("eu-west-1".to_string())).unwrap(),
            "eu-west-1"
        );
        assert_eq!(
            select_region(Some(""), Some("eu-west-1".to_string())).unwrap(),
            "eu-west-1"
        );
        assert!(matches!(select_region(None, None), Err(Error::Config(_))));
    }

    fn golden_client(
        _region: &str,
        _credentials: Option<StaticCredentials>,
    ) -> Result<Arc<dyn ServiceDiscoveryClient>> {
        Ok(Arc::new(MockServiceDiscovery::golden_path()))
    }

    fn cloudmap_config(key_pair: Option<(&str, &str)>) -> BackendConfig {
        BackendConfig::CloudMap {
            region: Some("us-east-1".to_string()),
            access_key_id: key_pair.map(|(id, _)| id.to_string()),
            secret_access_key: key_pair.map(|(_, secret)| secret.to_string()),
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }

    #[test]
    fn test_factory_creation() {
        let factory = CloudMapFactory::new(golden_client);

        let watcher = factory
            .create(&cloudmap_config(None), Arc::new(Store::new()))
            .unwrap();
        assert_eq!(watcher.name(), "cloudmap");
        assert_eq!(watcher.prefix(), PREFIX);
        assert_eq!(watcher.poll_interval(), Duration::from_secs(5));

        let consul = BackendConfig::consul("http://127.0.0.1:8500");
        assert!(factory.create(&consul, Arc::new(Store::new())).is_err());
    }

    #[test]
    fn test_factory_passes_region_and_credentials_to_builder() {
        let seen: Arc<Mutex<Vec<(String, Option<StaticCredentials>)>>> = Arc::default();
        let factory = CloudMapFactory::new({
            let seen = seen.clone();
            move |region: &str, credentials: Option<StaticCredentials>| {
                seen.lock().unwrap().push((region.to_string(), credentials));
                golden_client(region, None)
            }
        });

        factory
            .create(&cloudmap_config(Some(("AKID", "s3cr3t"))), Arc::new(Store::new()))
            .unwrap();
        factory
            .create(&cloudmap_config(None), Arc::new(Store::new()))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (
                    "us-east-1".to_string(),
                    Some(StaticCredentials {
                        access_key_id: "AKID".to_string(),
                        secret_access_key: "s3cr3t".to_string(),
                    })
                ),
                ("us-east-1".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_watcher_polls_the_built_client() {
        let factory = CloudMapFactory::new(golden_client);
        let store = Arc::new(Store::new());

        let watcher = factory
            .create(&cloudmap_config(None), store.clone())
            .unwrap();
        assert!(watcher.refresh().await);
        assert!(!store.hosts().is_empty());
    }

    #[test]
    fn test_factory_propagates_builder_error() {
        let factory = CloudMapFactory::new(|_: &str, _: Option<StaticCredentials>| {
            Err(Error::config("no usable credentials"))
        });

        let result = factory.create(&cloudmap_config(None), Arc::new(Store::new()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = StaticCredentials::from_config(Some("AKID"), Some("s3cr3t")).unwrap();
        let shown = format!("{:?}", credentials);
        assert!(shown.contains("AKID"));
        assert!(!shown.contains("s3cr3t"));

        assert!(StaticCredentials::from_config(Some("AKID"), None).is_none());
        assert!(StaticCredentials::from_config(Some(""), Some("")).is_none());
    }

    #[test]
    fn test_register() {
        let registry = WatcherRegistry::new();
        register(&registry, golden_client);
        assert!(registry.has_watcher("cloudmap"));
    }
}
