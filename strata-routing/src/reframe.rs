use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use strata_common::{AddrInfo, Cid, PeerId};
use tracing::debug;
use url::Url;

use crate::{ProvideMany, Routing, RoutingError};

/// How long a delegated provider record is asked to live.
pub const DEFAULT_PROVIDE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Client side of a delegated routing service.
#[async_trait]
pub trait DelegatedClient: Send + Sync {
    /// Asks the service for providers of `cid`.
    async fn find_providers(&self, cid: &Cid) -> Result<Vec<AddrInfo>, RoutingError>;

    /// Fetches the name record stored under `id`.
    async fn get_ipns(&self, id: &Bytes) -> Result<Option<Bytes>, RoutingError>;

    /// Publishes a name record under `id`.
    async fn put_ipns(&self, id: &Bytes, record: Bytes) -> Result<(), RoutingError>;

    /// Registers this node as a provider of `keys` for `ttl`. Returns the TTL granted by the
    /// service.
    async fn provide(&self, keys: &[Cid], ttl: Duration) -> Result<Duration, RoutingError>;
}

/// Creates delegated routing clients for an endpoint.
pub trait DelegatedConnector: Send + Sync {
    /// Creates a client for `endpoint`.
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn DelegatedClient>, RoutingError>;
}

/// Adapts a [`DelegatedClient`] to the [`Routing`] and [`ProvideMany`] capabilities.
///
/// Delegated services don't do peer routing, so `find_peer` is [`RoutingError::NotSupported`].
pub struct ReframeRouter {
    endpoint: Url,
    client: Arc<dyn DelegatedClient>,
    provide_ttl: Duration,
}

impl ReframeRouter {
    /// Wraps `client`, which talks to `endpoint`. Provides use [`DEFAULT_PROVIDE_TTL`].
    pub fn new(endpoint: Url, client: Arc<dyn DelegatedClient>) -> Self {
        Self { endpoint, client, provide_ttl: DEFAULT_PROVIDE_TTL }
    }

    /// Sets the TTL requested for provider records.
    pub fn with_provide_ttl(mut self, ttl: Duration) -> Self {
        self.provide_ttl = ttl;
        self
    }

    /// Returns the endpoint of the delegated service.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn provide_keys(&self, keys: &[Cid]) -> Result<(), RoutingError> {
        let granted = self.client.provide(keys, self.provide_ttl).await?;
        debug!(endpoint = %self.endpoint, keys = keys.len(), ttl = ?granted, "Provided to delegated router");
        Ok(())
    }
}

impl fmt::Debug for ReframeRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReframeRouter")
            .field("endpoint", &self.endpoint.as_str())
            .field("provide_ttl", &self.provide_ttl)
            .finish()
    }
}

#[async_trait]
impl Routing for ReframeRouter {
    async fn put_value(&self, key: &Bytes, value: Bytes) -> Result<(), RoutingError> {
        self.client.put_ipns(key, value).await
    }

    async fn get_value(&self, key: &Bytes) -> Result<Option<Bytes>, RoutingError> {
        self.client.get_ipns(key).await
    }

    async fn find_peer(&self, _peer: &PeerId) -> Result<Option<AddrInfo>, RoutingError> {
        Err(RoutingError::NotSupported)
    }

    async fn provide(&self, cid: &Cid, announce: bool) -> Result<(), RoutingError> {
        if !announce {
            return Ok(());
        }

        self.provide_keys(std::slice::from_ref(cid)).await
    }

    async fn find_providers(&self, cid: &Cid, limit: usize) -> Result<Vec<AddrInfo>, RoutingError> {
        let mut providers = self.client.find_providers(cid).await?;
        if limit != 0 {
            providers.truncate(limit);
        }

        Ok(providers)
    }

    async fn bootstrap(&self) -> Result<(), RoutingError> {
        Ok(())
    }

    fn as_provide_many(&self) -> Option<&dyn ProvideMany> {
        Some(self)
    }
}

#[async_trait]
impl ProvideMany for ReframeRouter {
    async fn provide_many(&self, keys: &[Cid]) -> Result<(), RoutingError> {
        self.provide_keys(keys).await
    }

    fn ready(&self) -> bool {
        true
    }
}
