//! Types shared by the strata crates: peer and content identities, and retry schedules.

use std::fmt;

use bytes::Bytes;

/// Retry schedules.
pub mod backoff;
pub use backoff::{Backoff, ExponentialBackoff};

/// Identity of a peer on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Wraps the textual form of a peer id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A network endpoint in its textual multiaddr form, e.g. `/ip4/1.2.3.4/tcp/4001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Multiaddr(String);

impl Multiaddr {
    /// Wraps a multiaddr string. The address is not validated.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Returns the textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A peer together with the addresses it can be reached on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrInfo {
    /// The peer.
    pub id: PeerId,
    /// Known addresses of the peer, possibly empty.
    pub addrs: Vec<Multiaddr>,
}

impl AddrInfo {
    /// Creates an entry for `id` without any addresses.
    pub fn new(id: PeerId) -> Self {
        Self { id, addrs: Vec::new() }
    }

    /// Adds an address.
    pub fn with_addr(mut self, addr: Multiaddr) -> Self {
        self.addrs.push(addr);
        self
    }
}

/// Content identifier. Opaque bytes as far as routing is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cid(Bytes);

impl Cid {
    /// Wraps the binary form of a content identifier.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw identifier bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl From<&'static str> for Cid {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}
