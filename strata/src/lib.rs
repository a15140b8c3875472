//! Umbrella crate re-exporting the strata routing, configuration and resource admission crates.

#![doc(issue_tracker_base_url = "https://github.com/chainbound/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use strata_common::*;

/// Routing configuration: router types, parameters and the routers section.
pub use strata_config as config;
/// Resource admission and the backpressure resource manager.
pub use strata_rcmgr as rcmgr;
/// Routing backends, the router factory and the tiered router.
pub use strata_routing as routing;
