//! Client configuration: options, resolution and process-wide policy.

pub mod deprecation;
pub mod options;
pub mod resolver;

pub use deprecation::DeprecationPolicy;
pub use options::{ClientOptions, Role, SentinelAddr, DEFAULT_SENTINEL_PORT};
pub use resolver::{
    ResolvedConfig, Resolver, Topology, DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_URL_ENV,
};
