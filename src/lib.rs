//! Redis protocol client facade for AiKv.
//!
//! The crate decides from configuration which topology to connect to
//! (standalone, sentinel or cluster) and then serializes every command,
//! pipeline, transaction and pub/sub loop through a single shared session
//! produced by a [`ConnectionProvider`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use aikv_client::{Client, ClientOptions, Command, ConnectionProvider};
//! # fn demo(provider: Arc<dyn ConnectionProvider>) -> aikv_client::Result<()> {
//! let client = Client::new(ClientOptions::new().with_url("redis://127.0.0.1:6379/0"), provider)?;
//! client.call(Command::new("SET").arg("greeting").arg("hello"))?;
//! let replies = client.pipelined(|pipe| {
//!     pipe.call(Command::new("INCR").arg("counter"));
//!     pipe.call(Command::new("GET").arg("greeting"));
//!     Ok(())
//! })?;
//! assert_eq!(replies.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod provider;

pub use client::{Client, Commands, ConnectionInfo, Pipeline, Queued};
pub use config::{
    ClientOptions, DeprecationPolicy, ResolvedConfig, Resolver, Role, SentinelAddr, Topology,
};
pub use error::{ClientError, CommandErrorKind, ConnectionErrorKind, Result};
pub use protocol::{Command, RespValue};
pub use provider::{
    Batch, ConnectionProvider, ProviderContext, ProviderError, ProviderErrorKind, PubSubSession,
    ReconnectSwitch, Session, SessionHandle, SubscriptionCommand, SubscriptionEvent,
};
