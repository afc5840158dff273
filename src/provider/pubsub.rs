use bytes::Bytes;

/// Channel-set change sent to a publish/subscribe session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionCommand {
    Subscribe(Vec<Bytes>),
    Unsubscribe(Vec<Bytes>),
    PatternSubscribe(Vec<Bytes>),
    PatternUnsubscribe(Vec<Bytes>),
}

impl SubscriptionCommand {
    /// Wire name of the command, e.g. `SUBSCRIBE`
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionCommand::Subscribe(_) => "SUBSCRIBE",
            SubscriptionCommand::Unsubscribe(_) => "UNSUBSCRIBE",
            SubscriptionCommand::PatternSubscribe(_) => "PSUBSCRIBE",
            SubscriptionCommand::PatternUnsubscribe(_) => "PUNSUBSCRIBE",
        }
    }

    pub fn channels(&self) -> &[Bytes] {
        match self {
            SubscriptionCommand::Subscribe(c)
            | SubscriptionCommand::Unsubscribe(c)
            | SubscriptionCommand::PatternSubscribe(c)
            | SubscriptionCommand::PatternUnsubscribe(c) => c,
        }
    }
}

/// Event received from a publish/subscribe session.
///
/// `count` is the number of subscriptions still active on the session after
/// the (un)subscription took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Subscribe {
        channel: Bytes,
        count: usize,
    },
    Unsubscribe {
        channel: Bytes,
        count: usize,
    },
    PatternSubscribe {
        pattern: Bytes,
        count: usize,
    },
    PatternUnsubscribe {
        pattern: Bytes,
        count: usize,
    },
    Message {
        channel: Bytes,
        payload: Bytes,
    },
    PatternMessage {
        pattern: Bytes,
        channel: Bytes,
        payload: Bytes,
    },
}
