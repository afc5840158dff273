//! Publish/subscribe session state.
//!
//! The slot is either empty (idle) or holds the handle of the one running
//! loop (active). Calls arriving while active are forwarded to that handle.
//! The slot only ever holds its own mutex for the instant it takes to move
//! an `Arc` in or out; the loop itself runs without any lock.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::provider::{PubSubSession, SubscriptionCommand, SubscriptionEvent};

#[derive(Default)]
pub(crate) struct SubscriptionSlot {
    handle: Mutex<Option<Arc<dyn PubSubSession>>>,
}

/// Outcome of trying to occupy the slot.
pub(crate) enum Claim<'a> {
    /// The slot was empty and now holds the new handle
    Installed(ActiveSubscription<'a>),
    /// Another loop got there first; the new handle was closed
    Occupied(Arc<dyn PubSubSession>),
}

impl SubscriptionSlot {
    pub(crate) fn current(&self) -> Option<Arc<dyn PubSubSession>> {
        self.handle.lock().clone()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.handle.lock().is_some()
    }

    pub(crate) fn claim(&self, handle: Arc<dyn PubSubSession>) -> Claim<'_> {
        let mut slot = self.handle.lock();
        if let Some(existing) = slot.as_ref() {
            let existing = existing.clone();
            drop(slot);
            handle.close();
            return Claim::Occupied(existing);
        }
        *slot = Some(handle.clone());
        Claim::Installed(ActiveSubscription {
            slot: self,
            handle,
        })
    }

    fn release(&self) {
        self.handle.lock().take();
    }
}

/// The running loop's claim on the slot. Dropping it clears the slot and
/// closes the handle, whatever way the loop ended.
pub(crate) struct ActiveSubscription<'a> {
    slot: &'a SubscriptionSlot,
    handle: Arc<dyn PubSubSession>,
}

impl ActiveSubscription<'_> {
    /// Send the opening command, then dispatch events to `handler` until the
    /// handler breaks, the last subscription is dropped, a wait cycle times
    /// out, or an error occurs.
    pub(crate) fn listen<F>(
        &self,
        start: SubscriptionCommand,
        timeout: Option<Duration>,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(SubscriptionEvent) -> Result<ControlFlow<()>>,
    {
        self.handle.call(&start)?;
        while let Some(event) = self.handle.next_event(timeout)? {
            let last = ends_loop(&start, &event);
            if handler(event)?.is_break() || last {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for ActiveSubscription<'_> {
    fn drop(&mut self) {
        self.slot.release();
        self.handle.close();
        debug!("subscription loop finished");
    }
}

// The loop ends once the unsubscribe matching the opening command reports
// no remaining subscriptions.
fn ends_loop(start: &SubscriptionCommand, event: &SubscriptionEvent) -> bool {
    matches!(
        (start, event),
        (
            SubscriptionCommand::Subscribe(_),
            SubscriptionEvent::Unsubscribe { count: 0, .. }
        ) | (
            SubscriptionCommand::PatternSubscribe(_),
            SubscriptionEvent::PatternUnsubscribe { count: 0, .. }
        )
    )
}
