use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A single router parameter value.
///
/// Values that do not fit one of the typed variants are kept as [`ParamValue::Other`] so that a
/// malformed optional parameter never aborts startup; every typed accessor reads it as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A JSON boolean.
    Bool(bool),
    /// An integer. Floats end up in [`ParamValue::Other`].
    Number(i64),
    /// A single string.
    String(String),
    /// A list made only of strings.
    StringList(Vec<String>),
    /// Anything else, kept verbatim.
    Other(serde_json::Value),
}

/// Formats the value as it appears in the configuration document.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::StringList(list) => write!(f, "{list:?}"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

/// Known router parameter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterParam {
    /// URL of a delegated routing service. Required for `reframe` routers.
    Endpoint,
    /// Router priority, lower is more important.
    Priority,
    /// DHT operating mode, one of [`DhtMode::VALUES`](crate::DhtMode::VALUES).
    DhtMode,
    /// Keep a full view of the network's key space instead of a sparse routing table.
    TrackFullNetworkDht,
    /// Bootstrap peers as `<multiaddr>/p2p/<peer-id>` strings. Overrides the node's defaults.
    Bootstrappers,
    /// Restrict the DHT to public addresses.
    PublicIpNetwork,
}

impl RouterParam {
    /// Returns the key as spelled in the configuration document.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Endpoint => "Endpoint",
            Self::Priority => "Priority",
            Self::DhtMode => "Mode",
            Self::TrackFullNetworkDht => "TrackFullNetworkDHT",
            Self::Bootstrappers => "Bootstrappers",
            Self::PublicIpNetwork => "Public-IP-Network",
        }
    }
}

impl fmt::Display for RouterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only typed view over a router's parameters.
///
/// Every accessor returns `None` both when the key is missing and when it holds a value of
/// another type. Callers supply their own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterParams(FxHashMap<String, ParamValue>);

impl RouterParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn with(mut self, key: RouterParam, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key` to `value` in place.
    pub fn insert(&mut self, key: RouterParam, value: impl Into<ParamValue>) {
        self.0.insert(key.as_str().to_owned(), value.into());
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: RouterParam) -> Option<&ParamValue> {
        self.0.get(key.as_str())
    }

    /// Reads a string parameter.
    pub fn string(&self, key: RouterParam) -> Option<&str> {
        match self.get(key)? {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Reads an integer parameter.
    pub fn number(&self, key: RouterParam) -> Option<i64> {
        match self.get(key)? {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Reads a list of strings.
    pub fn string_slice(&self, key: RouterParam) -> Option<&[String]> {
        match self.get(key)? {
            ParamValue::StringList(list) => Some(list),
            _ => None,
        }
    }

    /// Reads a boolean parameter.
    pub fn bool(&self, key: RouterParam) -> Option<bool> {
        match self.get(key)? {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number of parameters, known or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
