//! Configuration model for routing backends.
//!
//! A node's routing section names the default routing mode and a set of routers. Each router has
//! a [`RouterType`], an [`Enabled`](RouterConfig::enabled) tri-state [`Flag`] and a loosely typed
//! parameter map, read through the tolerant accessors of [`RouterParams`].

use thiserror::Error;

mod flag;
pub use flag::Flag;

mod params;
pub use params::{ParamValue, RouterParam, RouterParams};

mod router;
pub use router::{DhtMode, RouterConfig, RouterType, Routers, Routing};

/// Errors raised while reading routing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A router `Type` that isn't one of [`RouterType::VALUES`].
    #[error("unknown router type {0:?}, expected one of {valid:?}", valid = RouterType::VALUES)]
    UnknownRouterType(String),
    /// A field holds a value outside of its accepted set.
    #[error("invalid value {value:?} for {field}, expected one of {valid:?}")]
    InvalidValue {
        /// The field as spelled in the document.
        field: &'static str,
        /// The offending value.
        value: String,
        /// The accepted values.
        valid: &'static [&'static str],
    },
    /// Two routers share a name.
    #[error("duplicate router name {0:?}")]
    DuplicateRouter(String),
    /// The document is not valid JSON or doesn't have the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
