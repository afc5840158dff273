//! Pipeline proxy.
//!
//! A [`Pipeline`] only exists while [`crate::Client::pipelined`] holds the
//! command lock. It queues commands on the provider's batch and never touches
//! the lock itself.

use std::time::Duration;

use tracing::debug;

use super::{normalize_timeout, Commands};
use crate::error::{ClientError, Result};
use crate::protocol::{Command, RespValue};
use crate::provider::{Batch, ProviderError, ProviderErrorKind};

/// Position of a queued command in the replies returned by the flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queued(usize);

impl Queued {
    pub fn index(&self) -> usize {
        self.0
    }

    /// Look up this command's reply
    pub fn reply<'r>(&self, replies: &'r [RespValue]) -> Option<&'r RespValue> {
        replies.get(self.0)
    }
}

/// Batch handle passed to a pipeline block.
pub struct Pipeline<'a> {
    batch: Box<dyn Batch + 'a>,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(batch: Box<dyn Batch + 'a>) -> Self {
        Self { batch }
    }

    /// Queue a command
    pub fn call(&mut self, command: Command) -> Queued {
        let position = Queued(self.batch.len());
        self.batch.queue(command);
        position
    }

    /// Queue a command built from its argument vector
    pub fn call_v<I, A>(&mut self, args: I) -> Queued
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        self.call(Command::from_args(args))
    }

    /// Queue a blocking command; `None` or zero waits indefinitely
    pub fn blocking_call(&mut self, command: Command, timeout: Option<Duration>) -> Queued {
        let position = Queued(self.batch.len());
        self.batch.queue_blocking(command, normalize_timeout(timeout));
        position
    }

    /// Queue MULTI, the commands issued by `f`, then EXEC, all in this
    /// batch. The returned position is the EXEC reply.
    ///
    /// If `f` fails the error propagates and, as for any failed pipeline
    /// block, nothing is sent.
    pub fn multi<F>(&mut self, f: F) -> Result<Queued>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.call(Command::new("MULTI"));
        f(self)?;
        Ok(self.call(Command::new("EXEC")))
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub(crate) fn flush(self) -> Result<Vec<RespValue>> {
        if self.batch.is_empty() {
            return Ok(Vec::new());
        }
        debug!(commands = self.batch.len(), "flushing pipeline");
        Ok(self.batch.flush()?)
    }
}

/// Interpret an EXEC reply: `None` when the transaction was aborted, an
/// error for the first command that failed inside it.
pub(crate) fn exec_replies(reply: RespValue) -> Result<Option<Vec<RespValue>>> {
    match reply {
        RespValue::Array(Some(items)) => {
            if let Some(RespValue::Error(message)) =
                items.iter().find(|item| matches!(item, RespValue::Error(_)))
            {
                return Err(ProviderError::new(ProviderErrorKind::Command, message.clone()).into());
            }
            Ok(Some(items))
        }
        reply if reply.is_nil() => Ok(None),
        other => Err(ClientError::UnexpectedReply(format!(
            "EXEC returned {:?}",
            other
        ))),
    }
}

impl Commands for Pipeline<'_> {
    type Reply = Queued;

    fn call(&mut self, command: Command) -> Result<Queued> {
        Ok(Pipeline::call(self, command))
    }

    fn blocking_call(&mut self, command: Command, timeout: Option<Duration>) -> Result<Queued> {
        Ok(Pipeline::blocking_call(self, command, timeout))
    }
}
