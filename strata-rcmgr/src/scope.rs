use std::sync::Arc;

use async_trait::async_trait;
use strata_common::{Multiaddr, PeerId};

use crate::{Direction, ProtocolId, ResourceError, ScopeStat};

/// Callback used to inspect a scope without taking ownership of it.
pub type ScopeView<'a, S> = &'a mut dyn FnMut(&S) -> Result<(), ResourceError>;

/// A resource accounting context against which memory and connection/stream counts are charged.
#[async_trait]
pub trait ResourceScope: Send + Sync {
    /// Reserves `size` bytes in the scope. If this fails no memory was reserved and the caller
    /// should handle the failure, e.g. by not growing a buffer.
    ///
    /// See [`priority`](crate::priority) for the meaning of `prio`.
    fn reserve_memory(&self, size: usize, prio: u8) -> Result<(), ResourceError>;

    /// Releases memory previously reserved with [`ResourceScope::reserve_memory`].
    fn release_memory(&self, size: usize);

    /// Returns the current resource usage of the scope.
    fn stat(&self) -> ScopeStat;

    /// Creates a new span rooted at this scope.
    async fn begin_span(&self) -> Result<Box<dyn ResourceScopeSpan>, ResourceError>;
}

/// A scope with a bounded lifetime. The owner must call [`ResourceScopeSpan::done`] to release
/// its resources; further use after that is undefined.
pub trait ResourceScopeSpan: ResourceScope {
    /// Ends the span, releasing everything reserved in it.
    fn done(&self);
}

/// Resources used by a service, across all its streams.
pub trait ServiceScope: ResourceScope {
    /// Returns the service name.
    fn name(&self) -> &str;
}

/// Resources used by a protocol, across all its streams.
pub trait ProtocolScope: ResourceScope {
    /// Returns the protocol this scope accounts for.
    fn protocol(&self) -> &ProtocolId;
}

/// Resources used by a single remote peer.
pub trait PeerScope: ResourceScope {
    /// Returns the peer this scope accounts for.
    fn peer(&self) -> &PeerId;
}

/// The scope of a connection, initially not associated with any peer.
pub trait ConnManagementScope: ResourceScopeSpan {
    /// Returns the peer scope of this connection, `None` if the peer isn't known yet.
    fn peer_scope(&self) -> Option<Arc<dyn PeerScope>>;

    /// Sets the peer of a previously unassociated connection.
    fn set_peer(&self, peer: &PeerId) -> Result<(), ResourceError>;
}

/// The scope of a stream, initially not negotiated.
pub trait StreamManagementScope: ResourceScopeSpan {
    /// Returns the protocol scope of this stream, `None` if no protocol was negotiated yet.
    fn protocol_scope(&self) -> Option<Arc<dyn ProtocolScope>>;

    /// Sets the protocol of a previously unnegotiated stream.
    fn set_protocol(&self, protocol: &ProtocolId) -> Result<(), ResourceError>;

    /// Returns the service owning the stream, if any.
    fn service_scope(&self) -> Option<Arc<dyn ServiceScope>>;

    /// Sets the service owning the stream.
    fn set_service(&self, service: &str) -> Result<(), ResourceError>;

    /// Returns the scope of the peer on the other end of the stream.
    fn peer_scope(&self) -> Arc<dyn PeerScope>;
}

/// Enforces resource limits across the system, peers, protocols and services.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Views the system wide scope, which constrains all other scopes.
    fn view_system(&self, f: ScopeView<'_, dyn ResourceScope>) -> Result<(), ResourceError>;

    /// Views the transient scope, which accounts for connections and streams that are not fully
    /// established yet.
    fn view_transient(&self, f: ScopeView<'_, dyn ResourceScope>) -> Result<(), ResourceError>;

    fn view_service(
        &self,
        service: &str,
        f: ScopeView<'_, dyn ServiceScope>,
    ) -> Result<(), ResourceError>;

    fn view_protocol(
        &self,
        protocol: &ProtocolId,
        f: ScopeView<'_, dyn ProtocolScope>,
    ) -> Result<(), ResourceError>;

    fn view_peer(&self, peer: &PeerId, f: ScopeView<'_, dyn PeerScope>) -> Result<(), ResourceError>;

    /// Creates a connection scope not yet associated with any peer. The caller owns the
    /// returned scope and must call [`ResourceScopeSpan::done`] when the connection ends.
    async fn open_connection(
        &self,
        dir: Direction,
        use_fd: bool,
        endpoint: &Multiaddr,
    ) -> Result<Box<dyn ConnManagementScope>, ResourceError>;

    /// Creates an unnegotiated stream scope. The caller owns the returned scope and must call
    /// [`ResourceScopeSpan::done`] when the stream ends.
    async fn open_stream(
        &self,
        peer: &PeerId,
        dir: Direction,
    ) -> Result<Box<dyn StreamManagementScope>, ResourceError>;

    fn close(&self) -> Result<(), ResourceError>;
}
