use std::{fmt, sync::Arc};

use strata_common::{AddrInfo, Multiaddr, PeerId};
use strata_config::{
    DhtMode, ParamValue, RouterConfig, RouterParam, RouterParams, RouterType,
    Routing as RoutingConfig,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{
    get_priority, Datastore, DelegatedConnector, NullRouter, ReframeRouter, Routing, RoutingError,
    TieredRouter, Validator,
};

/// Number of parallel queries a DHT runs per lookup.
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Bucket size of the full routing table.
pub const DEFAULT_BUCKET_SIZE: usize = 20;
/// Protocol prefix of the public DHT.
pub const DEFAULT_PROTOCOL_PREFIX: &str = "/ipfs";

/// Errors raised while building a router from configuration.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// A parameter required by the router type is absent.
    #[error("configuration param '{param}' is needed for {router_type} delegated routing types")]
    MissingParameter {
        /// The missing parameter.
        param: RouterParam,
        /// The router type that needs it.
        router_type: RouterType,
    },
    /// A parameter is set to a value outside of its accepted set.
    #[error("the value {value:?} for parameter {param} is invalid. Valid values are: {valid:?}")]
    InvalidValue {
        /// The offending parameter.
        param: RouterParam,
        /// The configured value, in its document form.
        value: String,
        /// The accepted values.
        valid: &'static [&'static str],
    },
    /// The `Endpoint` parameter is not a URL.
    #[error("invalid endpoint {value:?}: {source}")]
    InvalidEndpoint {
        /// The configured endpoint.
        value: String,
        /// Why it didn't parse.
        source: url::ParseError,
    },
    /// A `Bootstrappers` entry without a peer id.
    #[error("invalid bootstrapper {0:?}, expected <multiaddr>/p2p/<peer-id>")]
    InvalidBootstrapper(String),
    /// The backend itself failed to start.
    #[error("routing backend error: {0}")]
    Backend(#[from] RoutingError),
}

/// Execution context for building DHT routers. Lives for the duration of a factory call.
#[derive(Clone)]
pub struct ExtraDhtParams {
    /// Fallback for routers that don't set `TrackFullNetworkDHT`.
    pub track_full_network_dht: bool,
    /// Bootstrap peers for routers that don't set `Bootstrappers`.
    pub bootstrap_peers: Vec<AddrInfo>,
    /// Identity of the local host.
    pub host: PeerId,
    /// Record validator shared by every DHT.
    pub validator: Arc<dyn Validator>,
    /// Record store shared by every DHT.
    pub datastore: Arc<dyn Datastore>,
    /// Cancelled when the node shuts down.
    pub cancel: CancellationToken,
}

impl fmt::Debug for ExtraDhtParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraDhtParams")
            .field("track_full_network_dht", &self.track_full_network_dht)
            .field("bootstrap_peers", &self.bootstrap_peers)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Options for a DHT with a sparse (k-bucket) routing table.
#[derive(Clone)]
pub struct DhtOptions {
    /// Identity of the local host.
    pub host: PeerId,
    /// Never [`DhtMode::None`].
    pub mode: DhtMode,
    /// Parallel queries per lookup.
    pub concurrency: usize,
    /// Peers to connect to on bootstrap.
    pub bootstrap_peers: Vec<AddrInfo>,
    /// Restrict the DHT to public addresses. `None` lets the DHT decide.
    pub public_ip_network: Option<bool>,
    /// Record validator.
    pub validator: Arc<dyn Validator>,
    /// Record store.
    pub datastore: Arc<dyn Datastore>,
    /// Stops the DHT when cancelled.
    pub cancel: CancellationToken,
}

impl fmt::Debug for DhtOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhtOptions")
            .field("host", &self.host)
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("bootstrap_peers", &self.bootstrap_peers)
            .field("public_ip_network", &self.public_ip_network)
            .finish_non_exhaustive()
    }
}

/// Options for a DHT that tracks the full network.
#[derive(Clone)]
pub struct FullRtOptions {
    /// Identity of the local host.
    pub host: PeerId,
    /// Protocol prefix of the DHT to crawl.
    pub protocol_prefix: &'static str,
    /// Bucket size of the routing table.
    pub bucket_size: usize,
    /// Peers to connect to on bootstrap.
    pub bootstrap_peers: Vec<AddrInfo>,
    /// Record validator.
    pub validator: Arc<dyn Validator>,
    /// Record store.
    pub datastore: Arc<dyn Datastore>,
    /// Stops the DHT when cancelled.
    pub cancel: CancellationToken,
}

impl fmt::Debug for FullRtOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullRtOptions")
            .field("host", &self.host)
            .field("protocol_prefix", &self.protocol_prefix)
            .field("bucket_size", &self.bucket_size)
            .field("bootstrap_peers", &self.bootstrap_peers)
            .finish_non_exhaustive()
    }
}

/// Constructs DHT instances.
pub trait DhtConstructor: Send + Sync {
    /// Builds a DHT with a sparse routing table.
    fn new_dht(&self, options: DhtOptions) -> Result<Arc<dyn Routing>, RoutingError>;

    /// Builds a DHT that tracks the full network. It should support batch provides.
    fn new_full_rt(&self, options: FullRtOptions) -> Result<Arc<dyn Routing>, RoutingError>;
}

/// Builds a delegated routing backend. Requires the `Endpoint` parameter.
pub fn reframe_routing_from_config(
    conf: &RouterConfig,
    connector: &dyn DelegatedConnector,
) -> Result<Arc<dyn Routing>, FactoryError> {
    let addr = conf.parameters.string(RouterParam::Endpoint).ok_or(
        FactoryError::MissingParameter {
            param: RouterParam::Endpoint,
            router_type: conf.router_type,
        },
    )?;

    let endpoint = Url::parse(addr)
        .map_err(|source| FactoryError::InvalidEndpoint { value: addr.to_owned(), source })?;

    let client = connector.connect(&endpoint)?;
    Ok(Arc::new(ReframeRouter::new(endpoint, client)))
}

/// Builds a DHT backend.
///
/// With `TrackFullNetworkDHT` set, a full routing table DHT is built. Otherwise `Mode` selects
/// the operating mode, and `none` yields a [`NullRouter`].
pub fn dht_routing_from_config(
    conf: &RouterConfig,
    params: &ExtraDhtParams,
    dht: &dyn DhtConstructor,
) -> Result<Arc<dyn Routing>, FactoryError> {
    let bootstrap_peers = bootstrap_peers(&conf.parameters, params)?;

    let full_dht = conf
        .parameters
        .bool(RouterParam::TrackFullNetworkDht)
        .unwrap_or(params.track_full_network_dht);

    if full_dht {
        return Ok(dht.new_full_rt(FullRtOptions {
            host: params.host.clone(),
            protocol_prefix: DEFAULT_PROTOCOL_PREFIX,
            bucket_size: DEFAULT_BUCKET_SIZE,
            bootstrap_peers,
            validator: Arc::clone(&params.validator),
            datastore: Arc::clone(&params.datastore),
            cancel: params.cancel.clone(),
        })?);
    }

    // A missing mode reads as "" and a mistyped one keeps its raw form, so both are rejected
    // with the value that was actually configured.
    let mode = match conf.parameters.get(RouterParam::DhtMode) {
        Some(ParamValue::String(raw)) => raw.parse::<DhtMode>().ok(),
        _ => None,
    };
    let mode = mode.ok_or_else(|| FactoryError::InvalidValue {
        param: RouterParam::DhtMode,
        value: conf
            .parameters
            .get(RouterParam::DhtMode)
            .map(ToString::to_string)
            .unwrap_or_default(),
        valid: DhtMode::VALUES,
    })?;

    if mode == DhtMode::None {
        return Ok(Arc::new(NullRouter));
    }

    Ok(dht.new_dht(DhtOptions {
        host: params.host.clone(),
        mode,
        concurrency: DEFAULT_CONCURRENCY,
        bootstrap_peers,
        public_ip_network: conf.parameters.bool(RouterParam::PublicIpNetwork),
        validator: Arc::clone(&params.validator),
        datastore: Arc::clone(&params.datastore),
        cancel: params.cancel.clone(),
    })?)
}

/// Reads the `Bootstrappers` parameter, falling back to the context's peers when it's absent.
/// Entries are `<multiaddr>/p2p/<peer-id>`; entries for the same peer are merged.
fn bootstrap_peers(
    params: &RouterParams,
    extra: &ExtraDhtParams,
) -> Result<Vec<AddrInfo>, FactoryError> {
    let Some(entries) = params.string_slice(RouterParam::Bootstrappers) else {
        return Ok(extra.bootstrap_peers.clone());
    };

    let mut peers: Vec<AddrInfo> = Vec::with_capacity(entries.len());
    for entry in entries {
        let (addr, id) = entry
            .rsplit_once("/p2p/")
            .filter(|(_, id)| !id.is_empty() && !id.contains('/'))
            .ok_or_else(|| FactoryError::InvalidBootstrapper(entry.clone()))?;

        let id = PeerId::new(id);
        let idx = match peers.iter().position(|p| p.id == id) {
            Some(idx) => idx,
            None => {
                peers.push(AddrInfo::new(id));
                peers.len() - 1
            }
        };

        if !addr.is_empty() {
            peers[idx].addrs.push(Multiaddr::new(addr));
        }
    }

    Ok(peers)
}

/// The outcome of building every configured router.
#[derive(Debug)]
pub struct RoutingBuild {
    /// The routers that were built, in priority order.
    pub router: TieredRouter,
    /// Routers that failed to build, by name. They are left out of `router`.
    pub failures: Vec<(String, FactoryError)>,
}

/// Builds routing backends from configuration.
pub struct RouterFactory {
    dht_params: ExtraDhtParams,
    dht: Arc<dyn DhtConstructor>,
    delegated: Arc<dyn DelegatedConnector>,
}

impl fmt::Debug for RouterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterFactory")
            .field("dht_params", &self.dht_params)
            .finish_non_exhaustive()
    }
}

impl RouterFactory {
    /// Creates a factory. DHT routers are built with `dht` in the `dht_params` context,
    /// delegated routers connect through `delegated`.
    pub fn new(
        dht_params: ExtraDhtParams,
        dht: Arc<dyn DhtConstructor>,
        delegated: Arc<dyn DelegatedConnector>,
    ) -> Self {
        Self { dht_params, dht, delegated }
    }

    /// Builds a single router.
    pub fn build_router(&self, conf: &RouterConfig) -> Result<Arc<dyn Routing>, FactoryError> {
        match conf.router_type {
            RouterType::Reframe => reframe_routing_from_config(conf, self.delegated.as_ref()),
            RouterType::Dht => dht_routing_from_config(conf, &self.dht_params, self.dht.as_ref()),
        }
    }

    /// Builds every enabled router and composes them into a [`TieredRouter`] ordered by
    /// priority. A router that fails to build is skipped and reported in
    /// [`RoutingBuild::failures`]; it doesn't affect the others.
    ///
    /// If no routers are configured, a single DHT router named `default` is built in the mode
    /// named by the routing `Type` (auto when unset). An invalid `Type` is reported as a failure
    /// of that router.
    pub fn build(&self, routing: &RoutingConfig) -> RoutingBuild {
        let default_router;
        let entries: Vec<(&str, &RouterConfig)> = if routing.routers.is_empty() {
            let mode = routing.routing_type.as_deref().unwrap_or(DhtMode::Auto.as_str());
            default_router = RouterConfig::new(RouterType::Dht)
                .with_parameters(RouterParams::new().with(RouterParam::DhtMode, mode));
            vec![("default", &default_router)]
        } else {
            routing.enabled_routers().collect()
        };

        let mut prioritized = Vec::with_capacity(entries.len());
        let mut failures = Vec::new();

        for (name, conf) in entries {
            let priority = get_priority(&conf.parameters);
            match self.build_router(conf) {
                Ok(router) => {
                    debug!(router = name, router_type = %conf.router_type, priority, "Built router");
                    prioritized.push((priority, router));
                }
                Err(e) => {
                    warn!(router = name, router_type = %conf.router_type, err = %e, "Failed to build router, skipping");
                    failures.push((name.to_owned(), e));
                }
            }
        }

        RoutingBuild { router: TieredRouter::from_prioritized(prioritized), failures }
    }
}
