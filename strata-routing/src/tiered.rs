use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use rustc_hash::FxHashSet;
use strata_common::{AddrInfo, Cid, PeerId};
use strata_config::{RouterParam, RouterParams};
use tracing::debug;

use crate::{ProvideMany, Routing, RoutingError};

/// Priority of routers that don't configure one. Sorts after any explicit priority.
pub const DEFAULT_PRIORITY: i64 = 100_000;

/// Extracts the priority from router parameters. Small numbers represent more important routers.
pub fn get_priority(params: &RouterParams) -> i64 {
    params.number(RouterParam::Priority).unwrap_or(DEFAULT_PRIORITY)
}

/// A router composed of several backends, queried in priority order.
///
/// * Point lookups (`get_value`, `find_peer`) ask one tier at a time and return the first answer.
///   Errors are only surfaced when every tier failed, in which case the last error is returned.
/// * Writes (`put_value`, `provide`) go to every tier concurrently and succeed if any tier
///   accepted them.
/// * `find_providers` merges the answers of all tiers, de-duplicated by peer, up to the limit.
/// * `bootstrap` bootstraps every tier and reports all failures.
#[derive(Clone)]
pub struct TieredRouter {
    routers: Arc<[Arc<dyn Routing>]>,
    /// The batch provide fan-out over the capable routers, if there are any.
    provide_many: Option<Arc<ProvideManyWrapper>>,
}

impl TieredRouter {
    /// Creates a tiered router from routers that are already in delegation order.
    pub fn new(routers: Vec<Arc<dyn Routing>>) -> Self {
        let capable: Vec<_> =
            routers.iter().filter(|r| r.as_provide_many().is_some()).cloned().collect();

        let provide_many =
            (!capable.is_empty()).then(|| Arc::new(ProvideManyWrapper { pms: capable }));

        Self { routers: routers.into(), provide_many }
    }

    /// Creates a tiered router from `(priority, router)` pairs. Lower priorities are queried
    /// first; routers with equal priority keep their relative order.
    pub fn from_prioritized(routers: impl IntoIterator<Item = (i64, Arc<dyn Routing>)>) -> Self {
        let mut routers: Vec<_> = routers.into_iter().collect();
        routers.sort_by_key(|(priority, _)| *priority);

        Self::new(routers.into_iter().map(|(_, router)| router).collect())
    }

    /// Returns the routers in delegation order.
    pub fn routers(&self) -> &[Arc<dyn Routing>] {
        &self.routers
    }

    /// Returns a batch provide fan-out over every router that supports batch provides, or `None`
    /// if no router does.
    pub fn provide_many(&self) -> Option<Arc<dyn ProvideMany>> {
        self.provide_many.clone().map(|pm| pm as Arc<dyn ProvideMany>)
    }
}

impl fmt::Debug for TieredRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredRouter")
            .field("routers", &self.routers.len())
            .field("provide_many", &self.provide_many)
            .finish()
    }
}

/// Awaits `attempts` one at a time and returns the first `Some`.
async fn first_some<T, I, F>(op: &'static str, attempts: I) -> Result<Option<T>, RoutingError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<Option<T>, RoutingError>>,
{
    let mut last_err = None;
    let mut answered = false;

    for (tier, attempt) in attempts.into_iter().enumerate() {
        match attempt.await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => answered = true,
            Err(e) => {
                debug!(op, tier, err = %e, "Tier failed");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) if !answered => Err(e),
        _ => Ok(None),
    }
}

/// Runs `attempts` concurrently. Succeeds if any attempt succeeded.
async fn any_ok<I, F>(op: &'static str, attempts: I) -> Result<(), RoutingError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<(), RoutingError>>,
{
    let mut last_err = None;
    let mut succeeded = false;

    for (tier, result) in join_all(attempts).await.into_iter().enumerate() {
        match result {
            Ok(()) => succeeded = true,
            Err(e) => {
                debug!(op, tier, err = %e, "Tier failed");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) if !succeeded => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl Routing for TieredRouter {
    async fn put_value(&self, key: &Bytes, value: Bytes) -> Result<(), RoutingError> {
        any_ok("put_value", self.routers.iter().map(|r| r.put_value(key, value.clone()))).await
    }

    async fn get_value(&self, key: &Bytes) -> Result<Option<Bytes>, RoutingError> {
        let attempts: Vec<_> = self.routers.iter().map(|r| r.get_value(key)).collect();
        first_some("get_value", attempts).await
    }

    async fn find_peer(&self, peer: &PeerId) -> Result<Option<AddrInfo>, RoutingError> {
        let attempts: Vec<_> = self.routers.iter().map(|r| r.find_peer(peer)).collect();
        first_some("find_peer", attempts).await
    }

    async fn provide(&self, cid: &Cid, announce: bool) -> Result<(), RoutingError> {
        any_ok("provide", self.routers.iter().map(|r| r.provide(cid, announce))).await
    }

    async fn find_providers(&self, cid: &Cid, limit: usize) -> Result<Vec<AddrInfo>, RoutingError> {
        let mut providers = Vec::new();
        let mut seen = FxHashSet::default();
        let mut last_err = None;
        let mut answered = false;

        for (tier, router) in self.routers.iter().enumerate() {
            if limit != 0 && providers.len() >= limit {
                break;
            }

            // Tiers may return providers we already have, so each is asked for the full limit.
            match router.find_providers(cid, limit).await {
                Ok(found) => {
                    answered = true;
                    for provider in found {
                        if limit != 0 && providers.len() >= limit {
                            break;
                        }

                        if seen.insert(provider.id.clone()) {
                            providers.push(provider);
                        }
                    }
                }
                Err(e) => {
                    debug!(op = "find_providers", tier, err = %e, "Tier failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if !answered => Err(e),
            _ => Ok(providers),
        }
    }

    async fn bootstrap(&self) -> Result<(), RoutingError> {
        let errors: Vec<_> = join_all(self.routers.iter().map(|r| r.bootstrap()))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        RoutingError::combine(errors).map_or(Ok(()), Err)
    }

    fn as_provide_many(&self) -> Option<&dyn ProvideMany> {
        self.provide_many.as_deref().map(|pm| pm as &dyn ProvideMany)
    }
}

/// Forwards batch provides to several routers at once.
pub struct ProvideManyWrapper {
    /// Routers whose [`Routing::as_provide_many`] returns `Some`.
    pms: Vec<Arc<dyn Routing>>,
}

impl ProvideManyWrapper {
    /// Returns the number of routers the wrapper fans out to.
    pub fn len(&self) -> usize {
        self.pms.len()
    }

    /// Returns `true` if no router supports batch provides.
    pub fn is_empty(&self) -> bool {
        self.pms.is_empty()
    }
}

impl fmt::Debug for ProvideManyWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvideManyWrapper").field("routers", &self.pms.len()).finish()
    }
}

#[async_trait]
impl ProvideMany for ProvideManyWrapper {
    /// Sends the batch to every capable router concurrently. A failing router doesn't stop the
    /// others; all failures are returned together.
    async fn provide_many(&self, keys: &[Cid]) -> Result<(), RoutingError> {
        let results = join_all(self.pms.iter().map(|r| async move {
            match r.as_provide_many() {
                Some(pm) => pm.provide_many(keys).await,
                None => Ok(()),
            }
        }))
        .await;

        let errors: Vec<_> = results.into_iter().filter_map(Result::err).collect();
        if !errors.is_empty() {
            debug!(failed = errors.len(), total = self.pms.len(), "Batch provide failed");
        }

        RoutingError::combine(errors).map_or(Ok(()), Err)
    }

    /// Ready only when every capable router is ready.
    fn ready(&self) -> bool {
        self.pms.iter().all(|r| r.as_provide_many().is_some_and(|pm| pm.ready()))
    }
}
