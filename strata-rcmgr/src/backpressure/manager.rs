use std::{
    fmt,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use strata_common::{Multiaddr, PeerId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BackpressureOptions, BackpressureScope, ConnManagerScope, Shared, StreamManagerScope};
use crate::{
    ConnManagementScope, Direction, PeerScope, ProtocolId, ProtocolScope, ResourceError,
    ResourceManager, ResourceScope, ScopeView, ServiceScope, StreamManagementScope,
};

/// A [`ResourceManager`] that applies backpressure instead of failing.
///
/// Connection and stream admissions rejected by the delegate are retried according to
/// [`BackpressureOptions`], blocking only the calling task. Scopes handed out by this manager
/// apply the same policy to [`ResourceScope::begin_span`]. Memory reservations are never
/// retried: a failed reservation is returned to the caller right away.
///
/// Closing the manager stops every pending retry loop with [`ResourceError::Closed`].
pub struct BackpressureResourceManager<R> {
    delegate: R,
    shared: Arc<Shared>,
    /// Connection admissions currently waiting on the delegate.
    conn_count: AtomicI64,
    /// Stream admissions currently waiting on the delegate.
    stream_count: AtomicI64,
}

impl<R> fmt::Debug for BackpressureResourceManager<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackpressureResourceManager")
            .field("options", &self.shared.options)
            .field("closed", &self.shared.closed.is_cancelled())
            .field("conn_in_flight", &self.conn_count)
            .field("stream_in_flight", &self.stream_count)
            .finish_non_exhaustive()
    }
}

impl<R: ResourceManager> BackpressureResourceManager<R> {
    /// Wraps `delegate` with the default [`BackpressureOptions`].
    pub fn new(delegate: R) -> Self {
        Self::with_options(delegate, BackpressureOptions::default())
    }

    /// Wraps `delegate` with the given options.
    pub fn with_options(delegate: R, options: BackpressureOptions) -> Self {
        Self {
            delegate,
            shared: Arc::new(Shared {
                options,
                closed: CancellationToken::new(),
                span: tracing::Span::none(),
            }),
            conn_count: AtomicI64::new(0),
            stream_count: AtomicI64::new(0),
        }
    }

    /// Set the tracing span under which admission events are recorded.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.shared = Arc::new(Shared { span, ..Shared::clone(&self.shared) });
        self
    }

    /// Returns the admission options.
    pub fn options(&self) -> &BackpressureOptions {
        &self.shared.options
    }

    /// Returns the wrapped resource manager.
    pub fn delegate(&self) -> &R {
        &self.delegate
    }

    /// Returns the number of connection admissions currently in progress.
    pub fn conn_in_flight(&self) -> i64 {
        self.conn_count.load(Ordering::Relaxed)
    }

    /// Returns the number of stream admissions currently in progress.
    pub fn stream_in_flight(&self) -> i64 {
        self.stream_count.load(Ordering::Relaxed)
    }

    /// Returns `true` once [`ResourceManager::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Opens a connection scope, waiting for the delegate to admit it.
    pub async fn admit_connection(
        &self,
        dir: Direction,
        use_fd: bool,
        endpoint: &Multiaddr,
    ) -> Result<ConnManagerScope, ResourceError> {
        let scope = self
            .shared
            .admit("connection", &self.conn_count, self.shared.backoff(), move || {
                self.delegate.open_connection(dir, use_fd, endpoint)
            })
            .await?;

        Ok(BackpressureScope::new(scope, Arc::clone(&self.shared)))
    }

    /// Opens a stream scope, waiting for the delegate to admit it.
    pub async fn admit_stream(
        &self,
        peer: &PeerId,
        dir: Direction,
    ) -> Result<StreamManagerScope, ResourceError> {
        let scope = self
            .shared
            .admit("stream", &self.stream_count, self.shared.backoff(), move || {
                self.delegate.open_stream(peer, dir)
            })
            .await?;

        Ok(BackpressureScope::new(scope, Arc::clone(&self.shared)))
    }
}

#[async_trait]
impl<R: ResourceManager> ResourceManager for BackpressureResourceManager<R> {
    fn view_system(&self, f: ScopeView<'_, dyn ResourceScope>) -> Result<(), ResourceError> {
        self.delegate.view_system(f)
    }

    fn view_transient(&self, f: ScopeView<'_, dyn ResourceScope>) -> Result<(), ResourceError> {
        self.delegate.view_transient(f)
    }

    fn view_service(
        &self,
        service: &str,
        f: ScopeView<'_, dyn ServiceScope>,
    ) -> Result<(), ResourceError> {
        self.delegate.view_service(service, f)
    }

    fn view_protocol(
        &self,
        protocol: &ProtocolId,
        f: ScopeView<'_, dyn ProtocolScope>,
    ) -> Result<(), ResourceError> {
        self.delegate.view_protocol(protocol, f)
    }

    fn view_peer(&self, peer: &PeerId, f: ScopeView<'_, dyn PeerScope>) -> Result<(), ResourceError> {
        self.delegate.view_peer(peer, f)
    }

    async fn open_connection(
        &self,
        dir: Direction,
        use_fd: bool,
        endpoint: &Multiaddr,
    ) -> Result<Box<dyn ConnManagementScope>, ResourceError> {
        Ok(Box::new(self.admit_connection(dir, use_fd, endpoint).await?))
    }

    async fn open_stream(
        &self,
        peer: &PeerId,
        dir: Direction,
    ) -> Result<Box<dyn StreamManagementScope>, ResourceError> {
        Ok(Box::new(self.admit_stream(peer, dir).await?))
    }

    fn close(&self) -> Result<(), ResourceError> {
        debug!(
            parent: &self.shared.span,
            conns = self.conn_in_flight(),
            streams = self.stream_in_flight(),
            "Closing resource manager"
        );
        self.shared.closed.cancel();
        self.delegate.close()
    }
}
