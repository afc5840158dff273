//! Error taxonomy reported by connection providers.
//!
//! Providers describe failures with a [`ProviderErrorKind`]; the client maps
//! each kind onto its own error hierarchy (see [`crate::error::translate`]).

use std::fmt;

use thiserror::Error;

/// Error classes a provider may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// An established connection broke.
    Connection,
    /// No connection could be established.
    CannotConnect,
    /// The server rejected the supplied credentials.
    Authentication,
    /// Sentinel could not resolve the requested master or replica.
    Failover,
    /// Reading the reply timed out.
    ReadTimeout,
    /// Writing the request timed out.
    WriteTimeout,
    /// The peer sent bytes that do not form a valid reply.
    Protocol,
    /// The server is a read-only replica.
    ReadOnly,
    /// Generic command error reply.
    Command,
    /// NOPERM reply.
    Permission,
    /// WRONGTYPE reply.
    WrongType,
    /// OOM reply.
    OutOfMemory,
    /// NOSCRIPT reply.
    NoScript,
    /// Cluster bootstrap failed against every seed node.
    InitialSetup,
    /// The command cannot be routed in cluster mode.
    OrchestrationCommandNotSupported,
    /// The command's keys map to more than one node.
    AmbiguousNode,
    /// Several nodes failed the same fan-out command.
    ErrorCollection,
    /// A cluster transaction touched more than one node.
    TransactionConsistency,
    /// A node stopped answering and may be failing over.
    NodeMightBeDown,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure reported by a provider, with the provider-side trace preserved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    trace: Vec<String>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Attach provider-side context frames, outermost first
    pub fn with_trace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace.extend(frames.into_iter().map(Into::into));
        self
    }

    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

/// Result type used across the provider boundary
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
