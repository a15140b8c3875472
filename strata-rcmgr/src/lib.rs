//! Resource management capabilities and a backpressure layer on top of them.
//!
//! A [`ResourceManager`] decides whether new connections, streams, spans and memory reservations
//! fit within its limits. [`BackpressureResourceManager`] wraps any resource manager and turns
//! rejected connection, stream and span admissions into waits: the caller is retried with
//! exponential backoff until the delegate admits it, the retry budget runs out, or the manager
//! is closed.

use std::{error::Error as StdError, fmt};

use thiserror::Error;

mod scope;
pub use scope::{
    ConnManagementScope, PeerScope, ProtocolScope, ResourceManager, ResourceScope,
    ResourceScopeSpan, ScopeView, ServiceScope, StreamManagementScope,
};

mod backpressure;
pub use backpressure::{
    BackpressureOptions, BackpressureResourceManager, BackpressureScope, ConnManagerScope,
    SpanScope, StreamManagerScope,
};

pub use strata_common::{Multiaddr, PeerId};

/// Errors returned by resource managers and their scopes.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The request doesn't fit within the limits of the named scope.
    #[error("resource limit exceeded: {0}")]
    LimitExceeded(String),
    /// The scope was already released.
    #[error("resource scope closed")]
    ScopeClosed,
    /// The resource manager was closed.
    #[error("resource manager closed")]
    Closed,
    /// An admission was rejected more times than the retry budget allows.
    #[error("admission failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts made, including the first one.
        attempts: usize,
        /// The last rejection.
        source: Box<ResourceError>,
    },
    /// Implementation specific failure.
    #[error("resource manager error: {0}")]
    Other(Box<dyn StdError + Send + Sync>),
}

/// Direction of a connection or stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Not known yet, e.g. before the handshake.
    #[default]
    Unknown,
    /// Opened by the remote peer.
    Inbound,
    /// Opened by this node.
    Outbound,
}

/// Identifier of a negotiated protocol, e.g. `/ipfs/kad/1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolId(String);

impl ProtocolId {
    /// Wraps a protocol id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the protocol id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource usage of a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeStat {
    /// Open inbound streams.
    pub num_streams_inbound: usize,
    /// Open outbound streams.
    pub num_streams_outbound: usize,
    /// Open inbound connections.
    pub num_conns_inbound: usize,
    /// Open outbound connections.
    pub num_conns_outbound: usize,
    /// File descriptors in use.
    pub num_fd: usize,
    /// Reserved memory in bytes.
    pub memory: i64,
}

/// Memory reservation priorities. A reservation fails if the available memory is less than
/// `(1 + prio) / 256` of the scope limit.
pub mod priority {
    /// Fails once 40% of the limit is in use.
    pub const LOW: u8 = 101;
    /// Fails once 60% of the limit is in use.
    pub const MEDIUM: u8 = 152;
    /// Fails once 80% of the limit is in use.
    pub const HIGH: u8 = 203;
    /// Succeeds as long as any memory is left.
    pub const ALWAYS: u8 = 255;
}
