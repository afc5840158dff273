//! Client facade.
//!
//! One [`Client`] owns one provider session behind a command lock. Commands,
//! blocking commands, pipelines and transactions take the lock for their
//! full round trip. State queries, `close` and publish/subscribe go through
//! the session's shared handle and never wait for it.

mod lock;
mod pipeline;
mod subscription;

pub use pipeline::{Pipeline, Queued};

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use self::lock::CommandLock;
use self::pipeline::exec_replies;
use self::subscription::{Claim, SubscriptionSlot};
use crate::config::{ClientOptions, ResolvedConfig, Resolver, Topology};
use crate::error::{ClientError, Result};
use crate::protocol::{Command, RespValue};
use crate::provider::{
    ConnectionProvider, ProviderContext, ReconnectSwitch, Session, SessionHandle,
    SubscriptionCommand, SubscriptionEvent,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Zero means "wait indefinitely", same as `None`
pub(crate) fn normalize_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}

/// Command surface shared by [`Client`] and [`Pipeline`].
///
/// Code written against this trait runs unchanged directly on a client or
/// queued inside a pipeline block.
pub trait Commands {
    type Reply;

    fn call(&mut self, command: Command) -> Result<Self::Reply>;

    fn blocking_call(&mut self, command: Command, timeout: Option<Duration>) -> Result<Self::Reply>;

    fn call_v<I, A>(&mut self, args: I) -> Result<Self::Reply>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        Self: Sized,
    {
        self.call(Command::from_args(args))
    }
}

/// Location details of a standalone or sentinel connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub id: String,
    /// `host:port`
    pub location: String,
}

/// Thread-safe client facade.
pub struct Client {
    provider: Arc<dyn ConnectionProvider>,
    config: ResolvedConfig,
    session: CommandLock<Box<dyn Session>>,
    handle: Arc<dyn SessionHandle>,
    subscription: SubscriptionSlot,
    reconnect: Arc<ReconnectSwitch>,
}

impl Client {
    /// Resolve `options` (reading `REDIS_URL` as the default location) and
    /// connect through `provider`
    pub fn new(options: ClientOptions, provider: Arc<dyn ConnectionProvider>) -> Result<Self> {
        Self::with_resolver(options, provider, &Resolver::new())
    }

    /// Like [`Client::new`] with an explicit resolver
    pub fn with_resolver(
        options: ClientOptions,
        provider: Arc<dyn ConnectionProvider>,
        resolver: &Resolver,
    ) -> Result<Self> {
        let config = resolver.resolve(options)?;
        Self::connect(config, provider)
    }

    fn connect(config: ResolvedConfig, provider: Arc<dyn ConnectionProvider>) -> Result<Self> {
        let reconnect = Arc::new(ReconnectSwitch::default());
        let ctx = ProviderContext::new(reconnect.clone());

        let mut session = match config.topology() {
            Topology::Standalone => provider.build_standalone(&config, &ctx)?,
            Topology::Sentinel => provider.build_sentinel(&config, &ctx)?,
            Topology::Cluster => provider.build_cluster(&config, &ctx)?,
        };
        if config.inherit_socket() {
            session.inherit_socket();
        }
        let handle = session.handle();
        debug!(topology = %config.topology(), server = %handle.server_url(), "client connected");

        Ok(Self {
            provider,
            config,
            session: CommandLock::new(session),
            handle,
            subscription: SubscriptionSlot::default(),
            reconnect,
        })
    }

    pub fn topology(&self) -> Topology {
        self.config.topology()
    }

    /// The normalized options this client was built from
    pub fn options(&self) -> &ClientOptions {
        self.config.options()
    }

    /// Execute one command
    pub fn call(&self, command: Command) -> Result<RespValue> {
        let mut session = self.session.acquire()?;
        Ok(session.call(&command)?)
    }

    /// Execute one command given as an argument vector
    pub fn call_v<I, A>(&self, args: I) -> Result<RespValue>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.call(Command::from_args(args))
    }

    /// Execute a blocking command. The lock stays held for the whole wait;
    /// `None` or a zero timeout waits indefinitely.
    pub fn blocking_call(&self, command: Command, timeout: Option<Duration>) -> Result<RespValue> {
        let mut session = self.session.acquire()?;
        Ok(session.blocking_call(&command, normalize_timeout(timeout))?)
    }

    /// Run `f` with automatic reconnection disabled
    pub fn without_reconnect<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Self) -> T,
    {
        let _guard = self.reconnect.disable();
        f(self)
    }

    /// Queue every command issued on the pipeline and send them in one
    /// exchange. If `f` fails nothing is sent.
    pub fn pipelined<F>(&self, f: F) -> Result<Vec<RespValue>>
    where
        F: FnOnce(&mut Pipeline<'_>) -> Result<()>,
    {
        let mut session = self.session.acquire()?;
        let mut pipeline = Pipeline::new(session.pipelined());
        f(&mut pipeline)?;
        pipeline.flush()
    }

    /// Run the commands issued on the pipeline inside MULTI/EXEC.
    ///
    /// Returns `None` when the server aborted the transaction. A command
    /// that failed inside the transaction fails the whole call.
    pub fn multi<F>(&self, f: F) -> Result<Option<Vec<RespValue>>>
    where
        F: FnOnce(&mut Pipeline<'_>) -> Result<()>,
    {
        let mut exec = None;
        let mut replies = self.pipelined(|pipe| {
            exec = Some(pipe.multi(f)?);
            Ok(())
        })?;

        match exec {
            Some(exec) if exec.index() < replies.len() => {
                exec_replies(replies.swap_remove(exec.index()))
            }
            _ => Err(ClientError::UnexpectedReply(
                "EXEC reply missing from transaction".to_string(),
            )),
        }
    }

    /// Subscribe to `channels` and dispatch events to `handler` until it
    /// breaks or every channel is unsubscribed.
    ///
    /// While a loop is already running the channels are added to it instead
    /// and `handler` is not used.
    pub fn subscribe<I, A, F>(&self, channels: I, handler: F) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        F: FnMut(SubscriptionEvent) -> Result<ControlFlow<()>>,
    {
        self.subscription(SubscriptionCommand::Subscribe(to_bytes(channels)), None, handler)
    }

    /// Like [`Client::subscribe`], but return once no event arrived for
    /// `timeout`
    pub fn subscribe_with_timeout<I, A, F>(
        &self,
        timeout: Duration,
        channels: I,
        handler: F,
    ) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        F: FnMut(SubscriptionEvent) -> Result<ControlFlow<()>>,
    {
        self.subscription(
            SubscriptionCommand::Subscribe(to_bytes(channels)),
            normalize_timeout(Some(timeout)),
            handler,
        )
    }

    /// Subscribe to glob patterns
    pub fn psubscribe<I, A, F>(&self, patterns: I, handler: F) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        F: FnMut(SubscriptionEvent) -> Result<ControlFlow<()>>,
    {
        self.subscription(
            SubscriptionCommand::PatternSubscribe(to_bytes(patterns)),
            None,
            handler,
        )
    }

    pub fn psubscribe_with_timeout<I, A, F>(
        &self,
        timeout: Duration,
        patterns: I,
        handler: F,
    ) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
        F: FnMut(SubscriptionEvent) -> Result<ControlFlow<()>>,
    {
        self.subscription(
            SubscriptionCommand::PatternSubscribe(to_bytes(patterns)),
            normalize_timeout(Some(timeout)),
            handler,
        )
    }

    /// Drop channels from the running loop; all of them when empty
    pub fn unsubscribe<I, A>(&self, channels: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.forward(SubscriptionCommand::Unsubscribe(to_bytes(channels)))
    }

    /// Drop patterns from the running loop; all of them when empty
    pub fn punsubscribe<I, A>(&self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.forward(SubscriptionCommand::PatternUnsubscribe(to_bytes(patterns)))
    }

    /// Whether a publish/subscribe loop is running
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    fn subscription<F>(
        &self,
        command: SubscriptionCommand,
        timeout: Option<Duration>,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(SubscriptionEvent) -> Result<ControlFlow<()>>,
    {
        if let Some(active) = self.subscription.current() {
            return Ok(active.call(&command)?);
        }

        let handle = self.handle.pubsub()?;
        match self.subscription.claim(handle) {
            Claim::Installed(active) => {
                debug!(
                    command = command.name(),
                    channels = command.channels().len(),
                    "subscription loop started"
                );
                active.listen(command, timeout, handler)
            }
            Claim::Occupied(existing) => Ok(existing.call(&command)?),
        }
    }

    fn forward(&self, command: SubscriptionCommand) -> Result<()> {
        match self.subscription.current() {
            Some(active) => Ok(active.call(&command)?),
            None => Err(ClientError::Subscription(format!(
                "{} requires an active subscription",
                command.name()
            ))),
        }
    }

    /// True when the main session or the running subscription is connected
    pub fn is_connected(&self) -> bool {
        self.subscription
            .current()
            .is_some_and(|handle| handle.connected())
            || self.handle.connected()
    }

    /// Close the main session and the subscription session, if any.
    /// Safe to call repeatedly and from any thread, including from inside a
    /// pipeline block or a subscription handler.
    pub fn close(&self) {
        if let Some(subscription) = self.subscription.current() {
            subscription.close();
        }
        self.handle.close();
    }

    /// A new client with its own session, built from the same normalized
    /// configuration
    pub fn duplicate(&self) -> Result<Self> {
        Self::connect(self.config.for_new_connection(), self.provider.clone())
    }

    /// Provider-assigned id, else the server locator
    pub fn id(&self) -> String {
        self.handle.id().unwrap_or_else(|| self.handle.server_url())
    }

    /// Host, port and db of the connection. Not available in cluster mode.
    pub fn connection(&self) -> Result<ConnectionInfo> {
        if self.topology() == Topology::Cluster {
            return Err(ClientError::UnsupportedOperation(
                "connection details are not available in cluster mode".to_string(),
            ));
        }
        let host = self.handle.host();
        let port = self.handle.port();
        Ok(ConnectionInfo {
            location: format!("{}:{}", host, port),
            id: self.id(),
            db: self.handle.db(),
            host,
            port,
        })
    }

    /// Number of times the command lock was taken
    pub fn lock_acquisitions(&self) -> u64 {
        self.session.acquisitions()
    }
}

impl Commands for &Client {
    type Reply = RespValue;

    fn call(&mut self, command: Command) -> Result<RespValue> {
        Client::call(*self, command)
    }

    fn blocking_call(&mut self, command: Command, timeout: Option<Duration>) -> Result<RespValue> {
        Client::blocking_call(*self, command, timeout)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aikv-client v{} for {}", VERSION, self.id())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("topology", &self.topology())
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

fn to_bytes<I, A>(items: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = A>,
    A: AsRef<[u8]>,
{
    items
        .into_iter()
        .map(|item| Bytes::copy_from_slice(item.as_ref()))
        .collect()
}
