//! Routing backends and their composition.
//!
//! A [`Routing`] backend answers value, peer and provider lookups. Backends are built from
//! configuration by the [`RouterFactory`] and composed into a single [`TieredRouter`] that
//! queries them in priority order.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use strata_common::{AddrInfo, Cid, PeerId};

mod datastore;
pub use datastore::{Datastore, MemoryDatastore};

mod factory;
pub use factory::{
    dht_routing_from_config, reframe_routing_from_config, DhtConstructor, DhtOptions,
    ExtraDhtParams, FactoryError, FullRtOptions, RouterFactory, RoutingBuild,
    DEFAULT_BUCKET_SIZE, DEFAULT_CONCURRENCY, DEFAULT_PROTOCOL_PREFIX,
};

mod null;
pub use null::NullRouter;

mod reframe;
pub use reframe::{DelegatedClient, DelegatedConnector, ReframeRouter, DEFAULT_PROVIDE_TTL};

mod tiered;
pub use tiered::{get_priority, ProvideManyWrapper, TieredRouter, DEFAULT_PRIORITY};

/// Errors returned by routing backends.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The backend doesn't implement the operation or doesn't handle the key.
    #[error("routing: operation or key not supported")]
    NotSupported,
    /// A record failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// Backend specific failure.
    #[error("backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
    /// Failures of several backends, in priority order.
    #[error("{count} routers failed: {0:?}", count = .0.len())]
    Multiple(Vec<RoutingError>),
}

impl RoutingError {
    /// Creates a backend error from a message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into().into())
    }

    /// Folds a list of errors into a single one. Returns `None` if the list is empty.
    pub fn combine(mut errors: Vec<RoutingError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

/// A routing backend: key/value storage, peer discovery and content routing.
#[async_trait]
pub trait Routing: Send + Sync {
    /// Stores `value` under `key`.
    async fn put_value(&self, key: &Bytes, value: Bytes) -> Result<(), RoutingError>;

    /// Looks up the value stored under `key`. `Ok(None)` means the backend has no value.
    async fn get_value(&self, key: &Bytes) -> Result<Option<Bytes>, RoutingError>;

    /// Looks up the addresses of `peer`.
    async fn find_peer(&self, peer: &PeerId) -> Result<Option<AddrInfo>, RoutingError>;

    /// Adds this node to the providers of `cid`. If `announce` is false the record is only kept
    /// locally.
    async fn provide(&self, cid: &Cid, announce: bool) -> Result<(), RoutingError>;

    /// Finds up to `limit` providers of `cid`. A limit of 0 means no limit.
    async fn find_providers(&self, cid: &Cid, limit: usize) -> Result<Vec<AddrInfo>, RoutingError>;

    /// Brings the backend into a ready state, e.g. by connecting to bootstrap peers.
    async fn bootstrap(&self) -> Result<(), RoutingError>;

    /// Returns the batch provide capability of this backend, if it has one.
    fn as_provide_many(&self) -> Option<&dyn ProvideMany> {
        None
    }
}

/// Batch provide capability.
#[async_trait]
pub trait ProvideMany: Send + Sync {
    /// Advertises this node as a provider of every key in `keys`.
    async fn provide_many(&self, keys: &[Cid]) -> Result<(), RoutingError>;

    /// Returns whether the backend is ready to accept batch provides.
    fn ready(&self) -> bool;
}

/// Validates records before they are stored or returned.
pub trait Validator: Send + Sync {
    /// Checks that `value` is a valid record for `key`.
    fn validate(&self, key: &Bytes, value: &Bytes) -> Result<(), RoutingError>;

    /// Picks the best of several valid records for `key`, returning its index.
    fn select(&self, key: &Bytes, values: &[Bytes]) -> Result<usize, RoutingError>;
}
