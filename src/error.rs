use std::fmt;

use thiserror::Error;

use crate::provider::{ProviderError, ProviderErrorKind};

/// Connection-class failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    CannotConnect,
    Connection,
    Timeout,
    ReadOnly,
    Protocol,
    InitialSetup,
    NodeMightBeDown,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionErrorKind::CannotConnect => "cannot connect",
            ConnectionErrorKind::Connection => "connection error",
            ConnectionErrorKind::Timeout => "timeout",
            ConnectionErrorKind::ReadOnly => "read-only replica",
            ConnectionErrorKind::Protocol => "protocol error",
            ConnectionErrorKind::InitialSetup => "cluster initial setup failed",
            ConnectionErrorKind::NodeMightBeDown => "cluster node might be down",
        };
        f.write_str(s)
    }
}

/// Command-class failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandErrorKind {
    Generic,
    Permission,
    WrongType,
    OutOfMemory,
    NoScript,
    AmbiguousNode,
    OrchestrationNotSupported,
    ErrorCollection,
    TransactionConsistency,
}

impl fmt::Display for CommandErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandErrorKind::Generic => "command error",
            CommandErrorKind::Permission => "permission denied",
            CommandErrorKind::WrongType => "wrong type",
            CommandErrorKind::OutOfMemory => "out of memory",
            CommandErrorKind::NoScript => "no such script",
            CommandErrorKind::AmbiguousNode => "ambiguous cluster node",
            CommandErrorKind::OrchestrationNotSupported => "orchestration command not supported",
            CommandErrorKind::ErrorCollection => "errors on several cluster nodes",
            CommandErrorKind::TransactionConsistency => "cluster transaction consistency",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{kind}: {source}")]
    Connection {
        kind: ConnectionErrorKind,
        source: ProviderError,
    },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{kind}: {source}")]
    Command {
        kind: CommandErrorKind,
        source: ProviderError,
    },

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Deprecated: {0}")]
    Deprecated(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ClientError {
    /// Provider error this one was mapped from, if any
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ClientError::Connection { source, .. } | ClientError::Command { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::Connection { .. })
    }
}

/// Error class a provider error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Connection(ConnectionErrorKind),
    Command(CommandErrorKind),
}

/// Mapping table from provider error kinds to client error kinds.
///
/// The match is exhaustive, so adding a provider kind without a mapping
/// fails to compile.
pub fn translate(kind: ProviderErrorKind) -> ErrorClass {
    use ConnectionErrorKind as C;
    use CommandErrorKind as K;
    use ProviderErrorKind as P;

    match kind {
        P::Connection => ErrorClass::Connection(C::Connection),
        P::CannotConnect | P::Authentication | P::Failover => {
            ErrorClass::Connection(C::CannotConnect)
        }
        P::ReadTimeout | P::WriteTimeout => ErrorClass::Connection(C::Timeout),
        P::Protocol => ErrorClass::Connection(C::Protocol),
        P::ReadOnly => ErrorClass::Connection(C::ReadOnly),
        P::InitialSetup => ErrorClass::Connection(C::InitialSetup),
        P::NodeMightBeDown => ErrorClass::Connection(C::NodeMightBeDown),
        P::Command => ErrorClass::Command(K::Generic),
        P::Permission => ErrorClass::Command(K::Permission),
        P::WrongType => ErrorClass::Command(K::WrongType),
        P::OutOfMemory => ErrorClass::Command(K::OutOfMemory),
        P::NoScript => ErrorClass::Command(K::NoScript),
        P::AmbiguousNode => ErrorClass::Command(K::AmbiguousNode),
        P::OrchestrationCommandNotSupported => ErrorClass::Command(K::OrchestrationNotSupported),
        P::ErrorCollection => ErrorClass::Command(K::ErrorCollection),
        P::TransactionConsistency => ErrorClass::Command(K::TransactionConsistency),
    }
}

impl From<ProviderError> for ClientError {
    fn from(source: ProviderError) -> Self {
        match translate(source.kind()) {
            ErrorClass::Connection(kind) => ClientError::Connection { kind, source },
            ErrorClass::Command(kind) => ClientError::Command { kind, source },
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
