use std::{fmt, str::FromStr};

use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{ConfigError, Flag, RouterParams};

/// The kind of backend a router entry configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum RouterType {
    /// A delegated routing client speaking to a remote endpoint.
    Reframe,
    /// A local DHT instance.
    Dht,
}

impl RouterType {
    /// Every accepted `Type` value.
    pub const VALUES: &'static [&'static str] = &["reframe", "dht"];

    /// Returns the type as spelled in the configuration document.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reframe => "reframe",
            Self::Dht => "dht",
        }
    }
}

impl fmt::Display for RouterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouterType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reframe" => Ok(Self::Reframe),
            "dht" => Ok(Self::Dht),
            other => Err(ConfigError::UnknownRouterType(other.to_owned())),
        }
    }
}

impl TryFrom<String> for RouterType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RouterType> for &'static str {
    fn from(value: RouterType) -> Self {
        value.as_str()
    }
}

/// DHT operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum DhtMode {
    /// Act as a server when publicly reachable, as a client otherwise.
    Auto,
    /// Query the DHT without serving it.
    Client,
    /// Always serve the DHT.
    Server,
    /// DHT routing disabled.
    None,
}

impl DhtMode {
    /// Every accepted `Mode` value.
    pub const VALUES: &'static [&'static str] = &["dht", "dhtserver", "dhtclient", "none"];

    /// Returns the mode as spelled in the configuration document.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "dht",
            Self::Client => "dhtclient",
            Self::Server => "dhtserver",
            Self::None => "none",
        }
    }
}

impl fmt::Display for DhtMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DhtMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dht" => Ok(Self::Auto),
            "dhtclient" => Ok(Self::Client),
            "dhtserver" => Ok(Self::Server),
            "none" => Ok(Self::None),
            other => Err(ConfigError::InvalidValue {
                field: "Mode",
                value: other.to_owned(),
                valid: Self::VALUES,
            }),
        }
    }
}

impl TryFrom<String> for DhtMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DhtMode> for &'static str {
    fn from(value: DhtMode) -> Self {
        value.as_str()
    }
}

/// One configured routing backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Backend kind.
    #[serde(rename = "Type")]
    pub router_type: RouterType,
    /// Unset means enabled.
    #[serde(rename = "Enabled", default, skip_serializing_if = "Flag::is_default")]
    pub enabled: Flag,
    /// Extra configuration for this router. A common one for `reframe` routers is `Endpoint`.
    #[serde(rename = "Parameters", default)]
    pub parameters: RouterParams,
}

impl RouterConfig {
    /// Creates an enabled router without parameters.
    pub fn new(router_type: RouterType) -> Self {
        Self { router_type, enabled: Flag::Default, parameters: RouterParams::default() }
    }

    /// Sets the `Enabled` flag.
    pub fn with_enabled(mut self, enabled: impl Into<Flag>) -> Self {
        self.enabled = enabled.into();
        self
    }

    /// Replaces the parameters.
    pub fn with_parameters(mut self, parameters: RouterParams) -> Self {
        self.parameters = parameters;
        self
    }

    /// Routers are enabled unless explicitly disabled.
    pub const fn is_enabled(&self) -> bool {
        self.enabled.with_default(true)
    }
}

/// Named routers in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Routers(Vec<(String, RouterConfig)>);

impl Routers {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a router. Names are unique.
    pub fn insert(&mut self, name: impl Into<String>, config: RouterConfig) -> Result<(), ConfigError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ConfigError::DuplicateRouter(name));
        }

        self.0.push((name, config));
        Ok(())
    }

    /// Looks up a router by name.
    pub fn get(&self, name: &str) -> Option<&RouterConfig> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, config)| config)
    }

    /// Iterates over the routers in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouterConfig)> {
        self.0.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Returns the number of routers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no routers are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Routers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, config)| (name, config)))
    }
}

impl<'de> Deserialize<'de> for Routers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoutersVisitor;

        impl<'de> Visitor<'de> for RoutersVisitor {
            type Value = Routers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of router names to router configurations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Routers, A::Error> {
                let mut routers = Routers::new();
                while let Some((name, config)) = map.next_entry::<String, RouterConfig>()? {
                    routers.insert(name, config).map_err(de::Error::custom)?;
                }

                Ok(routers)
            }
        }

        deserializer.deserialize_map(RoutersVisitor)
    }
}

/// The routing section of a node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routing {
    /// Default routing mode, kept as written. It's only validated when a router is built from
    /// it, so an unknown value doesn't make the rest of the document unreadable. Unset lets the
    /// node decide.
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub routing_type: Option<String>,
    /// Configured routers. Empty means a single default DHT router.
    #[serde(rename = "Routers", default)]
    pub routers: Routers,
}

impl Routing {
    /// Parses a routing section from JSON.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Returns the routers that are not explicitly disabled, in configuration order.
    pub fn enabled_routers(&self) -> impl Iterator<Item = (&str, &RouterConfig)> {
        self.routers.iter().filter(|(_, config)| config.is_enabled())
    }
}
