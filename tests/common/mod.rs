//! Recording mock provider shared by the integration tests.
//!
//! Every session, batch and pub/sub session built by [`MockProvider`] writes
//! what it was asked to do into a shared [`Journal`], so tests can assert on
//! ordering and on what reached the "server".

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use aikv_client::provider::ProviderResult;
use aikv_client::{
    Batch, Client, ClientOptions, Command, ConnectionProvider, ProviderContext, ProviderError,
    ProviderErrorKind, PubSubSession, ResolvedConfig, Resolver, RespValue, Session, SessionHandle,
    SubscriptionCommand, SubscriptionEvent, Topology,
};
use bytes::Bytes;
use parking_lot::Mutex;

/// One observable action on the mock server
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Built {
        session: usize,
        topology: Topology,
    },
    Inherited {
        session: usize,
    },
    CallStart {
        session: usize,
        name: String,
        reconnect: bool,
    },
    CallEnd {
        session: usize,
        name: String,
    },
    Blocking {
        session: usize,
        name: String,
        timeout: Option<Duration>,
    },
    Flush {
        session: usize,
        names: Vec<String>,
    },
    PubSubOpened {
        session: usize,
    },
    Closed {
        session: usize,
    },
}

#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<Entry>>,
}

impl Journal {
    pub fn push(&self, entry: Entry) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().clone()
    }

    pub fn flushes(&self) -> Vec<Vec<String>> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Flush { names, .. } => Some(names),
                _ => None,
            })
            .collect()
    }
}

/// Shared state behind a [`MockProvider`]
#[derive(Default)]
pub struct MockState {
    pub journal: Journal,
    pub next_session: AtomicUsize,
    /// Failure returned by the next build, any topology
    pub build_failure: Mutex<Option<ProviderError>>,
    /// Pause inside each `call` so overlapping calls would show up
    pub call_delay: Mutex<Option<Duration>>,
    pub main_connected: AtomicBool,
    /// Events appended after the subscribe confirmations of the next pub/sub session
    pub pubsub_script: Mutex<Vec<ProviderResult<SubscriptionEvent>>>,
    pub pubsubs: Mutex<Vec<Arc<MockPubSub>>>,
    pub configs: Mutex<Vec<ResolvedConfig>>,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    pub state: Arc<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        provider.state.main_connected.store(true, Ordering::SeqCst);
        provider
    }

    pub fn client(&self, options: ClientOptions) -> aikv_client::Result<Client> {
        Client::with_resolver(
            options,
            Arc::new(self.clone()),
            &Resolver::with_default_url(None),
        )
    }

    pub fn fail_next_build(&self, error: ProviderError) {
        *self.state.build_failure.lock() = Some(error);
    }

    pub fn script_pubsub(&self, events: Vec<ProviderResult<SubscriptionEvent>>) {
        *self.state.pubsub_script.lock() = events;
    }

    pub fn last_pubsub(&self) -> Option<Arc<MockPubSub>> {
        self.state.pubsubs.lock().last().cloned()
    }

    fn build(
        &self,
        topology: Topology,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>> {
        if let Some(err) = self.state.build_failure.lock().take() {
            return Err(err);
        }
        let id = self.state.next_session.fetch_add(1, Ordering::SeqCst);
        self.state.journal.push(Entry::Built {
            session: id,
            topology,
        });
        self.state.configs.lock().push(config.clone());
        Ok(Box::new(MockSession {
            id,
            state: self.state.clone(),
            ctx: ctx.clone(),
            handle: Arc::new(MockHandle {
                id,
                state: self.state.clone(),
                config: config.clone(),
                closed: AtomicBool::new(false),
            }),
        }))
    }
}

impl ConnectionProvider for MockProvider {
    fn build_standalone(
        &self,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>> {
        self.build(Topology::Standalone, config, ctx)
    }

    fn build_sentinel(
        &self,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>> {
        self.build(Topology::Sentinel, config, ctx)
    }

    fn build_cluster(
        &self,
        config: &ResolvedConfig,
        ctx: &ProviderContext,
    ) -> ProviderResult<Box<dyn Session>> {
        self.build(Topology::Cluster, config, ctx)
    }
}

pub struct MockSession {
    id: usize,
    state: Arc<MockState>,
    ctx: ProviderContext,
    handle: Arc<MockHandle>,
}

/// Reply rules of the mock server
fn reply_for(command: &Command) -> ProviderResult<RespValue> {
    match command.name().as_str() {
        "PING" => Ok(RespValue::simple_string("PONG")),
        "FAIL" => Err(ProviderError::new(
            ProviderErrorKind::Command,
            "ERR failure requested",
        )),
        "WRONG" => Err(ProviderError::new(
            ProviderErrorKind::WrongType,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        )),
        "ECHO" => Ok(command
            .as_args()
            .get(1)
            .cloned()
            .map(|b| RespValue::BulkString(Some(b)))
            .unwrap_or_else(RespValue::null_bulk_string)),
        _ => Ok(RespValue::ok()),
    }
}

impl Session for MockSession {
    fn call(&mut self, command: &Command) -> ProviderResult<RespValue> {
        if self.handle.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                ProviderErrorKind::Connection,
                "connection closed",
            ));
        }
        let name = command.name();
        self.state.journal.push(Entry::CallStart {
            session: self.id,
            name: name.clone(),
            reconnect: self.ctx.reconnect().is_enabled(),
        });
        if let Some(delay) = *self.state.call_delay.lock() {
            thread::sleep(delay);
        }
        self.state.journal.push(Entry::CallEnd {
            session: self.id,
            name,
        });
        reply_for(command)
    }

    fn blocking_call(
        &mut self,
        command: &Command,
        timeout: Option<Duration>,
    ) -> ProviderResult<RespValue> {
        self.state.journal.push(Entry::Blocking {
            session: self.id,
            name: command.name(),
            timeout,
        });
        Ok(RespValue::null_array())
    }

    fn pipelined(&mut self) -> Box<dyn Batch + '_> {
        Box::new(MockBatch {
            session: self.id,
            state: self.state.clone(),
            queued: Vec::new(),
        })
    }

    fn inherit_socket(&mut self) {
        self.state
            .journal
            .push(Entry::Inherited { session: self.id });
    }

    fn handle(&self) -> Arc<dyn SessionHandle> {
        self.handle.clone()
    }
}

/// Shared half of a [`MockSession`]
pub struct MockHandle {
    id: usize,
    state: Arc<MockState>,
    config: ResolvedConfig,
    closed: AtomicBool,
}

impl SessionHandle for MockHandle {
    fn pubsub(&self) -> ProviderResult<Arc<dyn PubSubSession>> {
        self.state
            .journal
            .push(Entry::PubSubOpened { session: self.id });
        let script = std::mem::take(&mut *self.state.pubsub_script.lock());
        let pubsub = Arc::new(MockPubSub {
            script: Mutex::new(Some(script)),
            ..Default::default()
        });
        self.state.pubsubs.lock().push(pubsub.clone());
        Ok(pubsub)
    }

    fn connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.state.main_connected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.journal.push(Entry::Closed { session: self.id });
        }
    }

    fn host(&self) -> String {
        self.config
            .options()
            .host
            .clone()
            .unwrap_or_else(|| "localhost".to_string())
    }

    fn port(&self) -> u16 {
        self.config.options().port.unwrap_or(6379)
    }

    fn db(&self) -> u32 {
        self.config.options().db.unwrap_or(0)
    }

    fn id(&self) -> Option<String> {
        self.config.options().id.clone()
    }

    fn server_url(&self) -> String {
        match self.config.topology() {
            Topology::Cluster => self
                .config
                .options()
                .nodes
                .clone()
                .unwrap_or_default()
                .join(" "),
            _ => format!("redis://{}:{}/{}", self.host(), self.port(), self.db()),
        }
    }
}

/// Open transaction inside a [`MockBatch`]
#[derive(Default)]
struct Transaction {
    results: Vec<RespValue>,
    aborted: bool,
}

pub struct MockBatch {
    session: usize,
    state: Arc<MockState>,
    queued: Vec<Command>,
}

impl Batch for MockBatch {
    fn queue(&mut self, command: Command) {
        self.queued.push(command);
    }

    fn queue_blocking(&mut self, command: Command, _timeout: Option<Duration>) {
        self.queued.push(command);
    }

    fn len(&self) -> usize {
        self.queued.len()
    }

    /// Inside MULTI, `ABORT` makes EXEC return nil and a failing command
    /// becomes an error element of the EXEC reply.
    fn flush(self: Box<Self>) -> ProviderResult<Vec<RespValue>> {
        self.state.journal.push(Entry::Flush {
            session: self.session,
            names: self.queued.iter().map(Command::name).collect(),
        });

        let mut replies = Vec::with_capacity(self.queued.len());
        let mut transaction: Option<Transaction> = None;
        for command in &self.queued {
            let name = command.name();
            match name.as_str() {
                "MULTI" => {
                    transaction = Some(Transaction::default());
                    replies.push(RespValue::ok());
                }
                "EXEC" => match transaction.take() {
                    Some(tx) if tx.aborted => replies.push(RespValue::null_array()),
                    Some(tx) => replies.push(RespValue::array(tx.results)),
                    None => {
                        return Err(ProviderError::new(
                            ProviderErrorKind::Command,
                            "ERR EXEC without MULTI",
                        ))
                    }
                },
                _ => match transaction.as_mut() {
                    Some(tx) if name == "ABORT" => {
                        tx.aborted = true;
                        replies.push(RespValue::simple_string("QUEUED"));
                    }
                    Some(tx) => {
                        let result = reply_for(command)
                            .unwrap_or_else(|err| RespValue::error(err.message()));
                        tx.results.push(result);
                        replies.push(RespValue::simple_string("QUEUED"));
                    }
                    None => replies.push(reply_for(command)?),
                },
            }
        }
        Ok(replies)
    }
}

/// Pub/sub session that confirms (un)subscriptions and then replays its script
#[derive(Default)]
pub struct MockPubSub {
    events: Mutex<VecDeque<ProviderResult<SubscriptionEvent>>>,
    script: Mutex<Option<Vec<ProviderResult<SubscriptionEvent>>>>,
    channels: Mutex<Vec<Bytes>>,
    patterns: Mutex<Vec<Bytes>>,
    pub calls: Mutex<Vec<SubscriptionCommand>>,
    /// Timeout passed to each `next_event`
    pub timeouts: Mutex<Vec<Option<Duration>>>,
    pub closed: AtomicBool,
    pub disconnected: AtomicBool,
}

impl MockPubSub {
    fn count(&self) -> usize {
        self.channels.lock().len() + self.patterns.lock().len()
    }

    fn subscribe(&self, list: &Mutex<Vec<Bytes>>, items: &[Bytes]) -> Vec<(Bytes, usize)> {
        items
            .iter()
            .map(|item| {
                list.lock().push(item.clone());
                (item.clone(), self.count())
            })
            .collect()
    }

    fn unsubscribe(&self, list: &Mutex<Vec<Bytes>>, items: &[Bytes]) -> Vec<(Bytes, usize)> {
        let targets = if items.is_empty() {
            list.lock().clone()
        } else {
            items.to_vec()
        };
        targets
            .into_iter()
            .map(|item| {
                list.lock().retain(|existing| existing != &item);
                (item, self.count())
            })
            .collect()
    }
}

impl PubSubSession for MockPubSub {
    fn call(&self, command: &SubscriptionCommand) -> ProviderResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                ProviderErrorKind::Connection,
                "pub/sub session closed",
            ));
        }
        self.calls.lock().push(command.clone());

        let confirmations: Vec<SubscriptionEvent> = match command {
            SubscriptionCommand::Subscribe(chans) => self
                .subscribe(&self.channels, chans)
                .into_iter()
                .map(|(channel, count)| SubscriptionEvent::Subscribe { channel, count })
                .collect(),
            SubscriptionCommand::PatternSubscribe(pats) => self
                .subscribe(&self.patterns, pats)
                .into_iter()
                .map(|(pattern, count)| SubscriptionEvent::PatternSubscribe { pattern, count })
                .collect(),
            SubscriptionCommand::Unsubscribe(chans) => self
                .unsubscribe(&self.channels, chans)
                .into_iter()
                .map(|(channel, count)| SubscriptionEvent::Unsubscribe { channel, count })
                .collect(),
            SubscriptionCommand::PatternUnsubscribe(pats) => self
                .unsubscribe(&self.patterns, pats)
                .into_iter()
                .map(|(pattern, count)| SubscriptionEvent::PatternUnsubscribe { pattern, count })
                .collect(),
        };

        let mut events = self.events.lock();
        events.extend(confirmations.into_iter().map(Ok));
        if let Some(script) = self.script.lock().take() {
            events.extend(script);
        }
        Ok(())
    }

    fn next_event(&self, timeout: Option<Duration>) -> ProviderResult<Option<SubscriptionEvent>> {
        self.timeouts.lock().push(timeout);
        self.events.lock().pop_front().transpose()
    }

    fn connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.disconnected.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn message(channel: &'static str, payload: &'static str) -> ProviderResult<SubscriptionEvent> {
    Ok(SubscriptionEvent::Message {
        channel: Bytes::from_static(channel.as_bytes()),
        payload: Bytes::from_static(payload.as_bytes()),
    })
}
