//! Configuration resolver.
//!
//! Merges explicit options, the environment default URL and URL-embedded
//! sentinel credentials into one normalized configuration, and classifies
//! the topology.

use std::fmt;

use tracing::{debug, warn};
use url::Url;

use super::deprecation;
use super::options::ClientOptions;
use crate::error::{ClientError, Result};

/// Environment variable holding the default connection URL
pub const DEFAULT_URL_ENV: &str = "REDIS_URL";

/// Reconnect attempts used when the caller did not choose a value
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 1;

const URL_SCHEMES: &[&str] = &["redis", "rediss", "unix"];

/// Connection topology, fixed for the lifetime of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Standalone,
    Sentinel,
    Cluster,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Topology::Standalone => "standalone",
            Topology::Sentinel => "sentinel",
            Topology::Cluster => "cluster",
        };
        f.write_str(s)
    }
}

/// Normalized configuration handed to the connection provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    options: ClientOptions,
    topology: Topology,
    inherit_socket: bool,
}

impl ResolvedConfig {
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Whether the session must adopt an inherited socket after creation
    pub fn inherit_socket(&self) -> bool {
        self.inherit_socket
    }

    /// Reconnect attempts, always set after resolution
    pub fn reconnect_attempts(&self) -> u32 {
        self.options
            .reconnect_attempts
            .unwrap_or(DEFAULT_RECONNECT_ATTEMPTS)
    }

    /// Same configuration for a brand-new connection: nothing to inherit
    pub(crate) fn for_new_connection(&self) -> Self {
        Self {
            inherit_socket: false,
            ..self.clone()
        }
    }
}

/// Resolves [`ClientOptions`] into a [`ResolvedConfig`].
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    default_url: Option<String>,
}

impl Resolver {
    /// Resolver reading the default URL from `REDIS_URL` once, now
    pub fn new() -> Self {
        Self::with_default_url(std::env::var(DEFAULT_URL_ENV).ok())
    }

    /// Resolver with an explicit default URL instead of the environment
    pub fn with_default_url(default_url: Option<String>) -> Self {
        Self {
            default_url: default_url.filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn default_url(&self) -> Option<&str> {
        self.default_url.as_deref()
    }

    pub fn resolve(&self, mut options: ClientOptions) -> Result<ResolvedConfig> {
        if !options.has_server_location() {
            if let Some(url) = &self.default_url {
                debug!("using {} as connection url", DEFAULT_URL_ENV);
                options.url = Some(url.clone());
            }
        }

        if options.reconnect_attempts.is_none() {
            options.reconnect_attempts = Some(DEFAULT_RECONNECT_ATTEMPTS);
        }

        if let Some(cluster) = options.cluster.take() {
            deprecation::deprecate("the `cluster` option is deprecated, use `nodes`")?;
            if options.nodes.is_none() {
                options.nodes = Some(cluster);
            }
        }

        let inherit_socket = std::mem::take(&mut options.inherit_socket);

        let topology = classify(&options);
        match topology {
            Topology::Cluster => validate_cluster(&options)?,
            Topology::Sentinel => {
                merge_sentinel_url(&mut options)?;
                validate_sentinel(&options)?;
            }
            Topology::Standalone => {
                if let Some(url) = &options.url {
                    parse_url(url)?;
                }
            }
        }

        debug!(%topology, "resolved client configuration");
        Ok(ResolvedConfig {
            options,
            topology,
            inherit_socket,
        })
    }
}

fn classify(options: &ClientOptions) -> Topology {
    if options.nodes.is_some() {
        Topology::Cluster
    } else if options.sentinels.is_some() {
        Topology::Sentinel
    } else {
        Topology::Standalone
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ClientError::Configuration(format!("invalid url '{}': {}", raw, e)))?;
    if !URL_SCHEMES.contains(&url.scheme()) {
        return Err(ClientError::Configuration(format!(
            "unsupported url scheme '{}', expected one of {:?}",
            url.scheme(),
            URL_SCHEMES
        )));
    }
    Ok(url)
}

/// Take the master name and credentials from the URL when they were not set
/// explicitly.
fn merge_sentinel_url(options: &mut ClientOptions) -> Result<()> {
    let url = match options.url.as_deref() {
        Some(raw) => parse_url(raw)?,
        None => return Ok(()),
    };

    if options.name.is_none() {
        if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
            options.name = Some(host.to_string());
        }
    }
    if options.username.is_none() && !url.username().is_empty() {
        options.username = Some(url.username().to_string());
    }
    if options.password.is_none() {
        if let Some(password) = url.password().filter(|p| !p.is_empty()) {
            options.password = Some(password.to_string());
        }
    }
    Ok(())
}

fn validate_sentinel(options: &ClientOptions) -> Result<()> {
    if options.sentinels.as_ref().is_some_and(|s| s.is_empty()) {
        return Err(ClientError::Configuration(
            "sentinel list must not be empty".to_string(),
        ));
    }
    if options.name.is_none() {
        return Err(ClientError::Configuration(
            "sentinel configuration requires a master name (`name` or the url host)".to_string(),
        ));
    }
    Ok(())
}

fn validate_cluster(options: &ClientOptions) -> Result<()> {
    if options.nodes.as_ref().is_some_and(|n| n.is_empty()) {
        return Err(ClientError::Configuration(
            "cluster node list must not be empty".to_string(),
        ));
    }
    if options.sentinels.is_some() {
        warn!("both cluster nodes and sentinels configured, ignoring sentinels");
    }
    if options.db.is_some_and(|db| db != 0) {
        return Err(ClientError::Configuration(
            "cluster mode only supports db 0".to_string(),
        ));
    }
    Ok(())
}
