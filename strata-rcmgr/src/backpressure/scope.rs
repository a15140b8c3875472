use std::{
    fmt,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use strata_common::PeerId;
use tracing::warn;

use super::Shared;
use crate::{
    ConnManagementScope, PeerScope, ProtocolId, ProtocolScope, ResourceError, ResourceScope,
    ResourceScopeSpan, ScopeStat, ServiceScope, StreamManagementScope,
};

/// A connection scope handed out by a [`BackpressureResourceManager`](super::BackpressureResourceManager).
pub type ConnManagerScope = BackpressureScope<dyn ConnManagementScope>;
/// A stream scope handed out by a [`BackpressureResourceManager`](super::BackpressureResourceManager).
pub type StreamManagerScope = BackpressureScope<dyn StreamManagementScope>;
/// A span begun from a backpressure scope.
pub type SpanScope = BackpressureScope<dyn ResourceScopeSpan>;

/// Wraps a scope owned by the caller. Spans begun from it are admitted with backpressure;
/// everything else passes straight through to the wrapped scope.
pub struct BackpressureScope<S: ?Sized> {
    delegate: Box<S>,
    shared: Arc<Shared>,
    /// Span admissions currently waiting on this scope.
    span_count: AtomicI64,
}

impl<S: ?Sized> fmt::Debug for BackpressureScope<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackpressureScope")
            .field("spans_in_flight", &self.span_count)
            .finish_non_exhaustive()
    }
}

impl<S: ?Sized> BackpressureScope<S> {
    pub(super) fn new(delegate: Box<S>, shared: Arc<Shared>) -> Self {
        Self { delegate, shared, span_count: AtomicI64::new(0) }
    }

    /// Returns the number of span admissions currently in progress on this scope.
    pub fn spans_in_flight(&self) -> i64 {
        self.span_count.load(Ordering::Relaxed)
    }

    /// Returns the wrapped scope.
    pub fn inner(&self) -> &S {
        &self.delegate
    }
}

impl<S: ResourceScope + ?Sized> BackpressureScope<S> {
    /// Begins a span rooted at this scope, waiting for the wrapped scope to admit it.
    pub async fn admit_span(&self) -> Result<SpanScope, ResourceError> {
        let span = self
            .shared
            .admit("span", &self.span_count, self.shared.backoff(), move || {
                self.delegate.begin_span()
            })
            .await?;

        Ok(BackpressureScope::new(span, Arc::clone(&self.shared)))
    }
}

#[async_trait]
impl<S: ResourceScope + ?Sized> ResourceScope for BackpressureScope<S> {
    fn reserve_memory(&self, size: usize, prio: u8) -> Result<(), ResourceError> {
        let result = self.delegate.reserve_memory(size, prio);
        if let Err(ref e) = result {
            warn!(parent: &self.shared.span, size, prio, err = %e, "Memory reservation failed");
        }

        result
    }

    fn release_memory(&self, size: usize) {
        self.delegate.release_memory(size)
    }

    fn stat(&self) -> ScopeStat {
        self.delegate.stat()
    }

    async fn begin_span(&self) -> Result<Box<dyn ResourceScopeSpan>, ResourceError> {
        Ok(Box::new(self.admit_span().await?))
    }
}

impl<S: ResourceScopeSpan + ?Sized> ResourceScopeSpan for BackpressureScope<S> {
    fn done(&self) {
        self.delegate.done()
    }
}

impl<S: ConnManagementScope + ?Sized> ConnManagementScope for BackpressureScope<S> {
    fn peer_scope(&self) -> Option<Arc<dyn PeerScope>> {
        self.delegate.peer_scope()
    }

    fn set_peer(&self, peer: &PeerId) -> Result<(), ResourceError> {
        self.delegate.set_peer(peer)
    }
}

impl<S: StreamManagementScope + ?Sized> StreamManagementScope for BackpressureScope<S> {
    fn protocol_scope(&self) -> Option<Arc<dyn ProtocolScope>> {
        self.delegate.protocol_scope()
    }

    fn set_protocol(&self, protocol: &ProtocolId) -> Result<(), ResourceError> {
        self.delegate.set_protocol(protocol)
    }

    fn service_scope(&self) -> Option<Arc<dyn ServiceScope>> {
        self.delegate.service_scope()
    }

    fn set_service(&self, service: &str) -> Result<(), ResourceError> {
        self.delegate.set_service(service)
    }

    fn peer_scope(&self) -> Arc<dyn PeerScope> {
        self.delegate.peer_scope()
    }
}
