// # Consul Catalog Watcher
//
// This crate mirrors the Consul service catalog into a meshsync Store.
//
// ## Polling
//
// Every tick the watcher issues a blocking `list services` query carrying the
// last catalog index it saw. Consul holds the request until the catalog
// changes or the wait time elapses:
//
// - same index as before → nothing changed, the Store is left alone
// - new index → every service is described and the Store replaced wholesale
//
// ## Conversion
//
// - host = Consul service name
// - instance without an address → skipped
// - instance port > 0 → single port named after its well-known protocol
// - instance without a port → http (80) and https (443)
//
// ## Enterprise Namespaces
//
// The optional namespace is forwarded as the `ns` query parameter. It is only
// honoured by Consul Enterprise 1.7+.

use meshsync_core::config::BackendConfig;
use meshsync_core::infer;
use meshsync_core::model::{AddressRecord, Snapshot};
use meshsync_core::traits::{PollOutcome, Watcher, WatcherFactory};
use meshsync_core::{Error, Result, Store, WatcherRegistry};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Prefix of every object owned by this backend
pub const PREFIX: &str = "consul-";

/// Default interval between catalog polls
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Default blocking-query wait time
pub const DEFAULT_WAIT_SECS: u64 = 5;

/// Response header carrying the catalog index
const INDEX_HEADER: &str = "X-Consul-Index";

/// One instance of a service as listed by `/v1/catalog/service/<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogService {
    #[serde(rename = "ServiceID")]
    pub service_id: String,

    #[serde(rename = "ServiceName")]
    pub service_name: String,

    /// Address of the node running the instance
    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "ServicePort")]
    pub service_port: i64,

    #[serde(rename = "Namespace")]
    pub namespace: Option<String>,
}

/// Read access to the Consul catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Names of every registered service, plus the catalog index
    ///
    /// Blocks until the catalog index moves past `wait_index` or the
    /// configured wait time elapses.
    async fn list_services(
        &self,
        wait_index: u64,
        namespace: Option<&str>,
    ) -> Result<(Vec<String>, u64)>;

    /// Every instance of one service
    async fn service_instances(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CatalogService>>;
}

/// Catalog client speaking the Consul HTTP API
pub struct HttpCatalogClient {
    base: Url,
    wait: Duration,
    client: reqwest::Client,
}

impl HttpCatalogClient {
    /// Create a client for the agent at `endpoint`
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Consul HTTP endpoint (e.g., "http://127.0.0.1:8500")
    /// - `wait`: blocking-query wait time
    pub fn new(endpoint: &str, wait: Duration) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(Error::config("Consul endpoint not specified"));
        }

        let base = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("error parsing endpoint {}: {}", endpoint, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Consul endpoint is not a base URL: {}",
                endpoint
            )));
        }

        // The request must outlive the server-side wait
        let client = reqwest::Client::builder()
            .timeout(wait + Duration::from_secs(10))
            .build()
            .map_err(|e| Error::http(format!("error creating client: {}", e)))?;

        Ok(Self { base, wait, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Consul endpoint is not a base URL: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::backend(
                "consul",
                format!("HTTP error: {}", response.status()),
            ));
        }

        Ok(response)
    }
}

fn namespace_query(namespace: Option<&str>) -> Option<(&'static str, String)> {
    namespace
        .filter(|ns| !ns.is_empty())
        .map(|ns| ("ns", ns.to_string()))
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn list_services(
        &self,
        wait_index: u64,
        namespace: Option<&str>,
    ) -> Result<(Vec<String>, u64)> {
        let url = self.endpoint(&["v1", "catalog", "services"])?;

        let mut query = vec![
            ("index", wait_index.to_string()),
            ("wait", format!("{}s", self.wait.as_secs())),
        ];
        query.extend(namespace_query(namespace));

        let response = self.get(url, &query).await?;

        let index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::backend("consul", format!("missing or invalid {} header", INDEX_HEADER))
            })?;

        let body = read_body(response).await?;
        Ok((parse_service_names(&body)?, index))
    }

    async fn service_instances(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CatalogService>> {
        let url = self.endpoint(&["v1", "catalog", "service", name])?;
        let query: Vec<_> = namespace_query(namespace).into_iter().collect();

        let response = self.get(url, &query).await?;
        let body = read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| Error::http(format!("Failed to read response: {}", e)))
}

/// Sorted service names from a `/v1/catalog/services` body
///
/// A body that is not a JSON object of tag lists is an `Error::Json`.
pub fn parse_service_names(body: &str) -> Result<Vec<String>> {
    // Values are service tags, which are not needed
    let services: HashMap<String, Vec<String>> = serde_json::from_str(body)?;

    let mut names: Vec<String> = services.into_keys().collect();
    names.sort();
    Ok(names)
}

/// Convert one catalog instance into an address record
///
/// Returns `None` for instances without an address.
pub fn catalog_service_to_record(service: &CatalogService) -> Option<AddressRecord> {
    if service.address.is_empty() {
        tracing::info!(
            "instance {} of {}.{} is of a type that is not currently supported",
            service.service_id,
            service.service_name,
            service.namespace.as_deref().unwrap_or_default()
        );
        return None;
    }

    if service.service_port > 0 {
        return Some(infer::build_address_record(
            service.address.clone(),
            service.service_port,
        ));
    }

    tracing::info!(
        "no port found for address {}, assuming http (80) and https (443)",
        service.address
    );
    Some(infer::default_address_record(service.address.clone()))
}

/// Watcher polling the Consul catalog
pub struct ConsulWatcher {
    client: Arc<dyn CatalogClient>,
    store: Arc<Store>,
    namespace: Option<String>,
    tick_interval: Duration,

    /// Catalog index of the last successful listing
    last_index: AtomicU64,
}

impl ConsulWatcher {
    /// Create a watcher with the default tick interval
    pub fn new(client: Arc<dyn CatalogClient>, store: Arc<Store>) -> Self {
        Self {
            client,
            store,
            namespace: None,
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            last_index: AtomicU64::new(0),
        }
    }

    /// Restrict the watcher to one Enterprise namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Create with custom tick interval
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Catalog index of the last successful listing (0 before the first)
    pub fn last_index(&self) -> u64 {
        self.last_index.load(Ordering::SeqCst)
    }

    async fn describe_services(&self, names: &[String]) -> Snapshot {
        let namespace = self.namespace.as_deref();
        let mut snapshot = Snapshot::with_capacity(names.len());

        for name in names {
            let instances = match self.client.service_instances(name, namespace).await {
                Ok(instances) => instances,
                Err(e) => {
                    tracing::error!("error describing service catalog from Consul: {}", e);
                    continue;
                }
            };

            let records: Vec<AddressRecord> = instances
                .iter()
                .filter_map(catalog_service_to_record)
                .collect();

            if !records.is_empty() {
                snapshot.insert(name.clone(), records);
            }
        }

        snapshot
    }
}

#[async_trait]
impl Watcher for ConsulWatcher {
    fn name(&self) -> &str {
        "consul"
    }

    fn prefix(&self) -> &str {
        PREFIX
    }

    fn store(&self) -> &Store {
        &self.store
    }

    fn poll_interval(&self) -> Duration {
        self.tick_interval
    }

    async fn poll(&self) -> PollOutcome {
        let last = self.last_index();

        let names = match self
            .client
            .list_services(last, self.namespace.as_deref())
            .await
        {
            Ok((_, index)) if index == last => {
                tracing::info!("waiting for index to change: current index: {}", last);
                return PollOutcome::Unchanged;
            }
            Ok((names, index)) => {
                self.last_index.store(index, Ordering::SeqCst);
                names
            }
            Err(e) => {
                return PollOutcome::Failed(format!("error listing services from Consul: {}", e));
            }
        };

        PollOutcome::Updated(self.describe_services(&names).await)
    }
}

/// Factory for creating Consul watchers
pub struct ConsulFactory;

impl WatcherFactory for ConsulFactory {
    fn create(&self, config: &BackendConfig, store: Arc<Store>) -> Result<Arc<dyn Watcher>> {
        match config {
            BackendConfig::Consul {
                endpoint,
                namespace,
                tick_interval_secs,
                wait_secs,
            } => {
                let client = HttpCatalogClient::new(endpoint, Duration::from_secs(*wait_secs))?;

                tracing::info!("Consul watcher targeting {}", endpoint);

                Ok(Arc::new(
                    ConsulWatcher::new(Arc::new(client), store)
                        .with_namespace(namespace.clone())
                        .with_tick_interval(Duration::from_secs(*tick_interval_secs)),
                ))
            }
            _ => Err(Error::config("Invalid config for Consul watcher")),
        }
    }
}

/// Register the Consul watcher with a registry
pub fn register(registry: &WatcherRegistry) {
    registry.register_watcher("consul", Box::new(ConsulFactory));
}
