use async_trait::async_trait;
use bytes::Bytes;
use strata_common::{AddrInfo, Cid, PeerId};

use crate::{Routing, RoutingError};

/// A router that does nothing. Every operation succeeds immediately without touching the
/// network: writes are dropped and lookups come back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRouter;

#[async_trait]
impl Routing for NullRouter {
    async fn put_value(&self, _key: &Bytes, _value: Bytes) -> Result<(), RoutingError> {
        Ok(())
    }

    async fn get_value(&self, _key: &Bytes) -> Result<Option<Bytes>, RoutingError> {
        Ok(None)
    }

    async fn find_peer(&self, _peer: &PeerId) -> Result<Option<AddrInfo>, RoutingError> {
        Ok(None)
    }

    async fn provide(&self, _cid: &Cid, _announce: bool) -> Result<(), RoutingError> {
        Ok(())
    }

    async fn find_providers(
        &self,
        _cid: &Cid,
        _limit: usize,
    ) -> Result<Vec<AddrInfo>, RoutingError> {
        Ok(Vec::new())
    }

    async fn bootstrap(&self) -> Result<(), RoutingError> {
        Ok(())
    }
}
