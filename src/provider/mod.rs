//! Connection provider interface.
//!
//! The client never speaks the wire protocol itself. A [`ConnectionProvider`]
//! turns a resolved configuration into a live [`Session`], and the session in
//! turn hands out batches for pipelining and dedicated publish/subscribe
//! sessions. Socket I/O, reply decoding, reconnection retries and cluster
//! routing all live behind these traits.
//!
//! # Contract
//!
//! - Server error replies are reported as `Err(ProviderError)` with a
//!   command-class kind. `RespValue::Error` only appears as an element of
//!   an EXEC reply, for a queued command that failed inside a transaction.
//! - Before retrying a broken connection a provider must consult
//!   [`ProviderContext::reconnect`]; retries are only allowed while the switch
//!   is enabled, and never more than `reconnect_attempts` times.
//! - `SessionHandle::close` and `PubSubSession::close` must be idempotent.

mod error;
mod pubsub;

pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use pubsub::{SubscriptionCommand, SubscriptionEvent};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ResolvedConfig;
use crate::protocol::{Command, RespValue};

/// Builds sessions for each topology.
pub trait ConnectionProvider: Send + Sync {
    /// Connect to a single server addressed by url, host/port or path
    fn build_standalone(
        &self,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>>;

    /// Discover the server through the configured sentinels
    fn build_sentinel(
        &self,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>>;

    /// Connect to a cluster seeded by the configured nodes
    fn build_cluster(
        &self,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>>;
}

/// A live connection owned by exactly one client.
///
/// Only command traffic goes through the session, and the client calls it
/// with its command lock held. Everything that must stay reachable while a
/// command is in flight lives on the [`SessionHandle`].
pub trait Session: Send {
    /// Execute one command and wait for its reply
    fn call(&mut self, command: &Command) -> ProviderResult<RespValue>;

    /// Execute a blocking command. `None` waits indefinitely.
    fn blocking_call(
        &mut self,
        command: &Command,
        timeout: Option<Duration>,
    ) -> ProviderResult<RespValue>;

    /// Start a batch. Nothing reaches the server until [`Batch::flush`];
    /// dropping the batch discards it.
    fn pipelined(&mut self) -> Box<dyn Batch + '_>;

    /// Take over the socket inherited from a parent process instead of
    /// treating it as foreign after a fork.
    fn inherit_socket(&mut self) {}

    /// Shared handle to this session's state. Taken once, right after the
    /// session is built.
    fn handle(&self) -> Arc<dyn SessionHandle>;
}

/// State of a [`Session`] shared with the client outside its command lock.
///
/// `close` may be called while another thread is inside [`Session::call`];
/// the provider must then fail that call rather than leave it waiting.
pub trait SessionHandle: Send + Sync {
    /// Open a dedicated publish/subscribe session
    fn pubsub(&self) -> ProviderResult<Arc<dyn PubSubSession>>;

    fn connected(&self) -> bool;

    fn close(&self);

    fn host(&self) -> String;

    fn port(&self) -> u16;

    fn db(&self) -> u32;

    /// Connection id assigned through configuration, if any
    fn id(&self) -> Option<String>;

    /// Locator of the server(s) this session talks to
    fn server_url(&self) -> String;
}

/// Commands queued for a single round trip.
pub trait Batch {
    fn queue(&mut self, command: Command);

    fn queue_blocking(&mut self, command: Command, timeout: Option<Duration>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send every queued command in one exchange and collect the replies in
    /// queue order
    fn flush(self: Box<Self>) -> ProviderResult<Vec<RespValue>>;
}

/// Dedicated publish/subscribe session.
///
/// Methods take `&self`: a message handler may alter the channel set through
/// [`PubSubSession::call`] while the owning loop is between
/// [`PubSubSession::next_event`] calls.
pub trait PubSubSession: Send + Sync {
    fn call(&self, command: &SubscriptionCommand) -> ProviderResult<()>;

    /// Wait for the next event. `Ok(None)` means the wait cycle timed out;
    /// a `None` timeout waits indefinitely.
    fn next_event(&self, timeout: Option<Duration>) -> ProviderResult<Option<SubscriptionEvent>>;

    fn connected(&self) -> bool;

    fn close(&self);
}

/// Context handed to the provider alongside the configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    reconnect: Arc<ReconnectSwitch>,
}

impl ProviderContext {
    pub fn new(reconnect: Arc<ReconnectSwitch>) -> Self {
        Self { reconnect }
    }

    /// Switch the provider must check before reconnecting
    pub fn reconnect(&self) -> &ReconnectSwitch {
        &self.reconnect
    }
}

/// Lock-free flag controlling automatic reconnection.
///
/// Reconnection is enabled while no [`ReconnectGuard`] is alive. Guards nest.
#[derive(Debug, Default)]
pub struct ReconnectSwitch {
    disabled: AtomicUsize,
}

impl ReconnectSwitch {
    pub fn is_enabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire) == 0
    }

    /// Disable reconnection until the returned guard is dropped
    pub fn disable(&self) -> ReconnectGuard<'_> {
        self.disabled.fetch_add(1, Ordering::AcqRel);
        ReconnectGuard { switch: self }
    }
}

/// Re-enables reconnection on drop.
#[must_use = "reconnection is re-enabled as soon as the guard is dropped"]
pub struct ReconnectGuard<'a> {
    switch: &'a ReconnectSwitch,
}

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.switch.disabled.fetch_sub(1, Ordering::AcqRel);
    }
}
